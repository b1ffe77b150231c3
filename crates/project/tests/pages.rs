mod common;

use std::fs;

use common::{engine, file_names};
use projectpages_core::{EditorService, NewDocument};
use projectpages_project::{is_tagged, ImportSkip, ProjectError};

#[test]
fn new_page_numbers_from_control_basename() {
    let (dir, mut engine) = engine();
    let root = dir.path().join("Demo.project_pages");
    engine.new_project(dir.path(), "Demo").unwrap();

    let first = engine.new_page().unwrap();
    let second = engine.new_page().unwrap();
    assert_eq!(first, root.join("IMAGES").join("page_0001.kra"));
    assert_eq!(second, root.join("IMAGES").join("page_0002.kra"));
    assert_eq!(fs::read(&first).unwrap(), b"fake kra");
    assert_eq!(
        fs::read_to_string(root.join("TEXTS").join("page_0002.eo")).unwrap(),
        ""
    );

    let created = &engine.editor().created;
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].name, "page_0001");
    assert_eq!(created[0].width, 1920);
    assert_eq!(created[0].height, 1080);
    assert_eq!(engine.project().unwrap().index().cursor().image_index, Some(1));
}

#[test]
fn new_page_skips_numbers_taken_by_orphan_notes() {
    let (dir, mut engine) = engine();
    let root = dir.path().join("Demo.project_pages");
    engine.new_project(dir.path(), "Demo").unwrap();
    fs::write(root.join("TEXTS").join("page_0001.eo"), "orphan").unwrap();

    let image = engine.new_page().unwrap();
    assert_eq!(image, root.join("IMAGES").join("page_0002.kra"));
    assert_eq!(
        fs::read_to_string(root.join("TEXTS").join("page_0001.eo")).unwrap(),
        "orphan"
    );
}

#[test]
fn import_copies_images_and_skips_the_rest() {
    let (dir, mut engine) = engine();
    let root = dir.path().join("Demo.project_pages");
    engine.new_project(dir.path(), "Demo").unwrap();

    let sources = dir.path().join("incoming");
    fs::create_dir(&sources).unwrap();
    let photo = sources.join("photo.png");
    let scan = sources.join("scan.JPG");
    let readme = sources.join("readme.txt");
    let clash = sources.join("clash.png");
    for path in [&photo, &scan, &readme, &clash] {
        fs::write(path, b"data").unwrap();
    }
    fs::write(root.join("TEXTS").join("clash.eo"), "keep me").unwrap();

    let report = engine
        .import_pages(&[photo.clone(), scan.clone(), readme.clone(), clash.clone()])
        .unwrap();
    assert_eq!(file_names(&report.imported), vec!["photo.png", "scan.JPG"]);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[0], (readme, ImportSkip::Unsupported));
    assert!(matches!(report.skipped[1].1, ImportSkip::NoteExists(_)));
    assert_eq!(
        fs::read_to_string(root.join("TEXTS").join("clash.eo")).unwrap(),
        "keep me"
    );
    assert!(root.join("TEXTS").join("photo.eo").is_file());

    // A second import of the same file never overwrites.
    let again = engine.import_pages(&[photo]).unwrap();
    assert!(again.imported.is_empty());
    assert!(matches!(again.skipped[0].1, ImportSkip::ImageExists(_)));
    assert_eq!(engine.project().unwrap().index().images().len(), 2);
}

#[test]
fn delete_moves_page_into_tagged_trash() {
    let (dir, mut engine) = engine();
    let root = dir.path().join("Demo.project_pages");
    engine.new_project(dir.path(), "Demo").unwrap();
    let image = engine.new_page().unwrap();
    engine.new_page().unwrap();
    fs::write(root.join("IMAGES").join("page_0001.kra~"), b"backup").unwrap();

    let report = engine.delete_page(0).unwrap();
    assert_eq!(report.moved.len(), 3);
    assert!(report.skipped.is_empty());
    assert!(!image.exists());

    let trash = engine.trash_entries().unwrap();
    let names = file_names(&trash);
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|name| is_tagged(name)), "{names:?}");
    assert!(names.iter().any(|name| name.ends_with("page_0001.kra~")));

    let index = engine.project().unwrap().index();
    assert_eq!(file_names(index.images()), vec!["page_0002.kra"]);
    assert_eq!(index.cursor().image_index, Some(0));
}

#[test]
fn delete_same_name_twice_keeps_both_in_trash() {
    let (dir, mut engine) = engine();
    let root = dir.path().join("Demo.project_pages");
    engine.new_project(dir.path(), "Demo").unwrap();

    for _ in 0..2 {
        fs::write(root.join("IMAGES").join("sketch.png"), b"png").unwrap();
        engine
            .handle_event(projectpages_core::EditorEvent::DocumentCreated)
            .unwrap();
        engine.delete_page(0).unwrap();
    }
    let names = file_names(&engine.trash_entries().unwrap());
    assert_eq!(names.len(), 2);
    assert_ne!(names[0], names[1]);
    assert!(names.iter().all(|name| name.ends_with("sketch.png")));
}

#[test]
fn delete_rejects_rows_past_the_end() {
    let (dir, mut engine) = engine();
    engine.new_project(dir.path(), "Demo").unwrap();
    assert!(matches!(
        engine.delete_page(0),
        Err(ProjectError::RowOutOfRange { row: 0, len: 0 })
    ));
}

#[test]
fn source_page_saves_open_document_into_project() {
    let (dir, mut engine) = engine();
    let root = dir.path().join("Demo.project_pages");
    engine.new_project(dir.path(), "Demo").unwrap();

    let template: NewDocument = engine.project().unwrap().control().new_document("loose");
    let handle = engine.editor_mut().create_document(&template).unwrap();
    let image = engine.source_page(handle, "cover").unwrap();
    assert_eq!(image, root.join("IMAGES").join("cover.kra"));
    assert!(root.join("TEXTS").join("cover.eo").is_file());

    let other = engine.editor_mut().create_document(&template).unwrap();
    assert!(matches!(
        engine.source_page(other, "cover"),
        Err(ProjectError::NameConflict(_))
    ));
}

#[test]
fn notes_round_trip_through_selected_page() {
    let (dir, mut engine) = engine();
    engine.new_project(dir.path(), "Demo").unwrap();
    engine.new_page().unwrap();

    engine.select_page(0).unwrap();
    assert_eq!(engine.read_note().unwrap(), "");
    engine.write_note("panel one: wide shot").unwrap();
    assert_eq!(engine.read_note().unwrap(), "panel one: wide shot");
}

#[test]
fn open_page_hands_the_image_to_the_editor() {
    let (dir, mut engine) = engine();
    engine.new_project(dir.path(), "Demo").unwrap();
    let image = engine.new_page().unwrap();

    engine.open_page(0).unwrap();
    assert_eq!(
        engine.editor().calls.last().unwrap(),
        &format!("open {}", image.display())
    );
    assert!(matches!(
        engine.open_page(3),
        Err(ProjectError::RowOutOfRange { row: 3, len: 1 })
    ));
}
