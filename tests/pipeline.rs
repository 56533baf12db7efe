use image::imageops::FilterType;
use image::{ImageBuffer, Rgb};
use photodup::checkpoint::{CheckpointState, CheckpointStore};
use photodup::config::DedupConfig;
use photodup::pipeline::{Deduplicator, ScanPhase};
use photodup::report::Report;
use photodup::scanner;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn gradient_image(path: &Path, width: u32, height: u32) {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        let b = if (x / 16 + y / 16) % 2 == 0 { 200 } else { 30 };
        Rgb([r, g, b])
    });
    img.save(path).unwrap();
}

fn ring_image(path: &Path, size: u32) {
    let c = size as i64 / 2;
    let img = ImageBuffer::from_fn(size, size, |x, y| {
        let (dx, dy) = (x as i64 - c, y as i64 - c);
        let v: u8 = if ((dx * dx + dy * dy) / 400) % 2 == 0 { 240 } else { 10 };
        Rgb([v, v, 255 - v])
    });
    img.save(path).unwrap();
}

/// Three copies of one picture, one unrelated picture, one thumbnail that is
/// too small and a file that is not an image.
fn photo_library() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();

    let original = root.join("a.png");
    gradient_image(&original, 300, 200);
    let img = image::open(&original).unwrap();
    img.resize_exact(600, 400, FilterType::Lanczos3)
        .save(root.join("a_large.png"))
        .unwrap();

    let nested = root.join("exports");
    fs::create_dir_all(&nested).unwrap();
    img.to_rgb8().save(nested.join("a_copy.jpg")).unwrap();

    ring_image(&root.join("b.png"), 250);
    gradient_image(&root.join("thumb.png"), 80, 60);
    fs::write(root.join("notes.txt"), b"not an image").unwrap();

    temp_dir
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

#[test]
fn test_finds_copies_and_picks_best_keeper() {
    let library = photo_library();
    let dedup = Deduplicator::new(DedupConfig::default()).unwrap();

    let outcome = dedup.run(library.path()).unwrap();

    assert_eq!(outcome.total_images, 4);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.groups.len(), 1);

    let group = &outcome.groups[0];
    let mut names: Vec<String> = group.members.iter().map(|m| file_name(&m.path)).collect();
    names.sort();
    assert_eq!(names, vec!["a.png", "a_copy.jpg", "a_large.png"]);
    assert_eq!(file_name(&group.keeper().unwrap().path), "a_large.png");
    assert_eq!(group.members.iter().filter(|m| m.is_keeper).count(), 1);
    assert_eq!(outcome.duplicate_count(), 2);

    assert!(!library.path().join(".dedup_checkpoint.json").exists());
    assert!(library.path().join("a.png").exists());
}

#[test]
fn test_rotated_square_copy_is_grouped() {
    let temp_dir = TempDir::new().unwrap();
    let original = temp_dir.path().join("ring.png");
    ring_image(&original, 240);
    image::open(&original)
        .unwrap()
        .rotate270()
        .save(temp_dir.path().join("ring_rotated.png"))
        .unwrap();

    let outcome = Deduplicator::new(DedupConfig::default())
        .unwrap()
        .run(temp_dir.path())
        .unwrap();

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 2);
}

#[test]
fn test_larger_hash_size_still_groups_copies() {
    let library = photo_library();
    let config = DedupConfig {
        hash_size: 16,
        threshold: 40,
        ..DedupConfig::default()
    };

    let outcome = Deduplicator::new(config).unwrap().run(library.path()).unwrap();

    assert_eq!(outcome.groups.len(), 1);
    assert_eq!(outcome.groups[0].len(), 3);
    for member in &outcome.groups[0].members {
        assert_eq!(member.hashes.rot0.bit_len(), 256);
    }
}

#[test]
fn test_resume_after_interruption_gives_same_groups() {
    let library = photo_library();
    let fresh = Deduplicator::new(DedupConfig::default())
        .unwrap()
        .run(library.path())
        .unwrap();

    // Fingerprint part of the library, as an interrupted run would have.
    let config = DedupConfig {
        resume: true,
        checkpoint_interval: 1,
        ..DedupConfig::default()
    };
    let dedup = Deduplicator::new(config.clone()).unwrap();
    let store = CheckpointStore::new(config.checkpoint_path(library.path()));
    let images = scanner::find_images(library.path());
    let mut state = CheckpointState::default();
    dedup.fingerprint_all(&images[..2], &mut state, &store);
    assert!(store.exists());

    let (sender, receiver) = crossbeam_channel::unbounded();
    let resumed = dedup
        .with_progress_sender(sender)
        .run(library.path())
        .unwrap();

    let fingerprinting: Vec<_> = receiver
        .try_iter()
        .filter(|p| p.phase == ScanPhase::Fingerprinting)
        .collect();
    // One batch per remaining image.
    assert_eq!(fingerprinting.len(), images.len() - 2);

    let paths = |groups: &[photodup::DuplicateGroup]| -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|g| {
                let mut p: Vec<String> = g.members.iter().map(|m| m.path.clone()).collect();
                p.sort();
                p
            })
            .collect()
    };
    assert_eq!(paths(&resumed.groups), paths(&fresh.groups));
    assert_eq!(resumed.total_images, fresh.total_images);
    assert!(!store.exists());
}

#[test]
fn test_json_report() {
    let library = photo_library();
    let config = DedupConfig::default();
    let outcome = Deduplicator::new(config.clone())
        .unwrap()
        .run(library.path())
        .unwrap();

    let out_dir = TempDir::new().unwrap();
    let report_path = out_dir.path().join("report.json");
    Report::new(&outcome, &config).write_json(&report_path).unwrap();

    let report: Report =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report.summary.total_images, 4);
    assert_eq!(report.summary.duplicate_groups, 1);
    assert_eq!(report.summary.threshold, 10);
    assert_eq!(report.summary.hash_size, 8);
    assert_eq!(report.groups[0].images.len(), 3);
}
