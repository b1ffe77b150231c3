use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{Rgba, RgbaImage};
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Result<Self, Box<dyn Error>> {
        Ok(Self { dir: tempdir()? })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn archive(&self) -> PathBuf {
        self.path().join("Demo.project_pages.zip")
    }

    fn working_dir(&self) -> PathBuf {
        self.path().join("Demo.project_pages")
    }

    /// Command scoped to this fixture's workspace.
    fn cli(&self) -> Result<Command, Box<dyn Error>> {
        let mut cmd = Command::cargo_bin("projectpages-cli")?;
        cmd.current_dir(self.path())
            .args(["--workspace", self.path().to_str().unwrap()]);
        Ok(cmd)
    }

    fn create(&self) -> Result<(), Box<dyn Error>> {
        self.cli()?
            .args(["new", self.path().to_str().unwrap(), "Demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));
        Ok(())
    }

    fn sample_image(&self, name: &str) -> Result<PathBuf, Box<dyn Error>> {
        let path = self.path().join(name);
        RgbaImage::from_pixel(8, 4, Rgba([200, 40, 40, 255])).save(&path)?;
        Ok(path)
    }
}

#[test]
fn new_creates_archive_and_cleans_up() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new()?;
    fx.create()?;

    assert!(fx.archive().is_file());
    assert!(!fx.working_dir().exists());

    fx.cli()?
        .args(["validate", fx.archive().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid project archive"));

    fx.cli()?
        .args(["new", fx.path().to_str().unwrap(), "Demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("name conflict"));
    Ok(())
}

#[test]
fn pages_notes_rename_export_and_delete() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new()?;
    fx.create()?;
    let archive = fx.archive();
    let archive = archive.to_str().unwrap();
    let first = fx.sample_image("a.png")?;
    let second = fx.sample_image("b.png")?;

    fx.cli()?
        .args(["import", archive])
        .args([&first, &second])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported a.png"))
        .stdout(predicate::str::contains("Imported b.png"));

    fx.cli()?
        .args(["note", archive, "1", "--set", "wide establishing shot"])
        .assert()
        .success();
    fx.cli()?
        .args(["note", archive, "1"])
        .assert()
        .success()
        .stdout("wide establishing shot\n");

    fx.cli()?
        .args(["rename", archive, "scene"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scene_NNNN"));
    fx.cli()?
        .args(["info", archive])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pages: 2"))
        .stdout(predicate::str::contains("1  scene_0001.png  scene_0001.eo"))
        .stdout(predicate::str::contains("Template: page 1920x1080"));
    fx.cli()?
        .args(["note", archive, "1"])
        .assert()
        .success()
        .stdout("wide establishing shot\n");

    let out = fx.path().join("out");
    fx.cli()?
        .args(["export", archive, out.to_str().unwrap(), "--max-edge", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[2/2] scene_0002.png"))
        .stdout(predicate::str::contains("Exported 2 file(s)"));
    let exported = image::open(out.join("scene_0001.png"))?;
    assert_eq!((exported.width(), exported.height()), (4, 2));

    fx.cli()?
        .args(["delete", archive, "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trashed [ Trash_"));
    fx.cli()?
        .args(["info", archive])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pages: 1"))
        .stdout(predicate::str::contains("Trash: 2"));

    let settings = fs::read_to_string(fx.path().join(".projectpages").join("settings.json"))?;
    assert!(settings.contains("\"scene\""), "{settings}");
    assert!(!fx.working_dir().exists());
    Ok(())
}

#[test]
fn rename_defaults_to_last_template() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new()?;
    fx.create()?;
    let archive = fx.archive();
    let image = fx.sample_image("cover.png")?;
    fx.cli()?
        .args(["import", archive.to_str().unwrap()])
        .arg(&image)
        .assert()
        .success();

    fx.cli()?
        .args(["rename", archive.to_str().unwrap()])
        .assert()
        .success();
    fx.cli()?
        .args(["info", archive.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("page_0001.png"));
    Ok(())
}

#[test]
fn kept_working_dir_blocks_next_open() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new()?;
    fx.create()?;
    let archive = fx.archive();

    fx.cli()?
        .args(["--keep-working-dir", "info", archive.to_str().unwrap()])
        .assert()
        .success();
    assert!(fx.working_dir().join("control.eo").is_file());

    fx.cli()?
        .args(["info", archive.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("name conflict"));
    Ok(())
}

#[test]
fn rejects_page_zero_and_missing_notes() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new()?;
    fx.create()?;
    let archive = fx.archive();

    fx.cli()?
        .args(["note", archive.to_str().unwrap(), "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("page numbers start at 1"));
    fx.cli()?
        .args(["delete", archive.to_str().unwrap(), "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
    assert!(!fx.working_dir().exists());
    Ok(())
}

#[test]
fn validate_reports_non_archives() -> Result<(), Box<dyn Error>> {
    let fx = Fixture::new()?;
    let bogus = fx.path().join("notes.zip");
    fs::write(&bogus, "plain text")?;

    fx.cli()?
        .args(["validate", bogus.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error:"));
    Ok(())
}
