use std::fs;
use std::io::Write;

use merger_engine::{commit_staged, ensure_output_dir, stage_beside, write_atomically};
use tempfile::TempDir;

fn leftovers(dir: &std::path::Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect()
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("out").join("nested");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn file_in_place_of_output_dir_is_rejected() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();
    assert!(ensure_output_dir(&file_path).is_err());
}

#[test]
fn staged_file_sits_beside_destination() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("merged.xlsx");
    let staged = stage_beside(&destination).unwrap();

    let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
    assert_eq!(staged.path().parent(), Some(temp.path()));
    assert!(name.starts_with("merged.xlsx."), "{name}");
    assert!(name.ends_with(".tmp"), "{name}");
    assert!(!destination.exists());
}

#[test]
fn dropped_stage_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("merged.xlsx");
    {
        let mut staged = stage_beside(&destination).unwrap();
        staged.write_all(b"partial").unwrap();
    }
    assert!(leftovers(temp.path()).is_empty());
    assert!(!destination.exists());
}

#[test]
fn commit_replaces_existing_destination() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("merged.xlsx");
    fs::write(&destination, "old").unwrap();

    let mut staged = stage_beside(&destination).unwrap();
    staged.write_all(b"new").unwrap();
    commit_staged(staged, &destination).unwrap();

    assert_eq!(fs::read_to_string(&destination).unwrap(), "new");
    assert!(leftovers(temp.path()).is_empty());
}

#[test]
fn atomic_write_creates_parent_folder() {
    let temp = TempDir::new().unwrap();
    let destination = temp.path().join("out").join("settings.ron");

    write_atomically(&destination, b"hello").unwrap();
    assert_eq!(fs::read_to_string(&destination).unwrap(), "hello");

    write_atomically(&destination, b"world").unwrap();
    assert_eq!(fs::read_to_string(&destination).unwrap(), "world");
}

#[test]
fn no_partial_file_when_parent_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let destination = file_path.join("merged.xlsx");
    assert!(write_atomically(&destination, b"data").is_err());
    assert_eq!(fs::read_to_string(&file_path).unwrap(), "x");
}
