use rompatch::Format;
use rompatch_util::{
    ApplyError, CreateError, CreateOutcome, PatchApplier, PatchCreator, SilentProgress,
    default_output_path, map_file,
};
use std::fs;

fn n64_image(len: usize) -> Vec<u8> {
    let mut image: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    image[..4].copy_from_slice(&[0x80, 0x37, 0x12, 0x40]);
    image[0x3C..0x3E].copy_from_slice(b"FT");
    image[0x3E] = b'E';
    image
}

#[test]
fn ips_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let original = vec![0u8; 0x800];
    let mut modified = original.clone();
    modified[0x100..0x140].fill(0x33);
    modified[0x700] = 1;
    modified.truncate(0x780);

    let patch_path = dir.path().join("hack.ips");
    let outcome = PatchCreator::new(Format::Ips, SilentProgress, false)
        .create(&original, &modified, &patch_path)
        .unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(s) if s.records == 2));

    let original_path = dir.path().join("game.sfc");
    fs::write(&original_path, &original).unwrap();

    let patch = unsafe { map_file(&patch_path) }.unwrap();
    let output = default_output_path(&original_path);
    let summary = PatchApplier::new(SilentProgress, false)
        .apply(&patch, &original, &output)
        .unwrap();

    assert_eq!(summary.final_len, 0x780);
    assert_eq!(fs::read(&output).unwrap(), modified);
    assert_eq!(fs::read(&original_path).unwrap(), original);
}

#[test]
fn aps_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let original = n64_image(0x1000);
    let mut modified = original.clone();
    modified[0x400..0x410].fill(0);
    modified.extend_from_slice(&[0xAB; 0x20]);

    let patch_path = dir.path().join("hack.aps");
    PatchCreator::new(Format::Aps, SilentProgress, false)
        .description("files test")
        .create(&original, &modified, &patch_path)
        .unwrap();

    let patch = fs::read(&patch_path).unwrap();
    let output = dir.path().join("out.z64");
    let summary = PatchApplier::new(SilentProgress, false)
        .apply(&patch, &original, &output)
        .unwrap();

    assert_eq!(summary.description.as_deref(), Some("files test"));
    assert_eq!(fs::read(&output).unwrap(), modified);
}

#[test]
fn identical_images_leave_no_patch() {
    let dir = tempfile::tempdir().unwrap();
    let image = vec![7u8; 64];
    let patch_path = dir.path().join("same.ips");

    let outcome = PatchCreator::new(Format::Ips, SilentProgress, false)
        .create(&image, &image, &patch_path)
        .unwrap();

    assert_eq!(outcome, CreateOutcome::Identical);
    assert!(!patch_path.exists());
}

#[test]
fn identical_n64_images_leave_no_aps_patch() {
    let dir = tempfile::tempdir().unwrap();
    let image = n64_image(0x400);
    let patch_path = dir.path().join("same.aps");

    let outcome = PatchCreator::new(Format::Aps, SilentProgress, false)
        .description("nothing changed")
        .create(&image, &image, &patch_path)
        .unwrap();

    assert_eq!(outcome, CreateOutcome::Identical);
    assert!(!patch_path.exists());
}

#[test]
fn failed_creation_leaves_no_patch() {
    let dir = tempfile::tempdir().unwrap();
    let small = vec![0u8; 16];
    let patch_path = dir.path().join("small.aps");

    let err = PatchCreator::new(Format::Aps, SilentProgress, false)
        .create(&small, &[1u8; 16], &patch_path)
        .unwrap_err();

    assert!(matches!(err, CreateError::EncodeFailed { .. }));
    assert!(!patch_path.exists());
}

#[test]
fn corrupt_patch_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let original = vec![0u8; 32];
    let output = dir.path().join("out.bin");

    let err = PatchApplier::new(SilentProgress, false)
        .format(Format::Ips)
        .apply(b"PATCX\x00\x00\x01\x00\x01\x09EOF", &original, &output)
        .unwrap_err();

    assert!(matches!(
        err,
        ApplyError::PatchFailed {
            source: rompatch::ApplyError::InvalidMagic { .. },
            ..
        }
    ));
    assert!(!output.exists());

    let err = PatchApplier::new(SilentProgress, false)
        .apply(b"PATCH\x00\x00\x01\x00\x08\x09", &original, &output)
        .unwrap_err();

    assert!(matches!(err, ApplyError::PatchFailed { .. }));
    assert!(!output.exists());
}

#[test]
fn unknown_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.bin");

    let err = PatchApplier::new(SilentProgress, false)
        .apply(b"BPS1", &[0u8; 8], &output)
        .unwrap_err();

    assert!(matches!(err, ApplyError::UnknownFormat));
    assert!(!output.exists());
}

#[test]
fn existing_output_needs_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let original = vec![0u8; 8];
    let output = dir.path().join("out.bin");
    fs::write(&output, b"keep me").unwrap();

    let patch = b"PATCH\x00\x00\x02\x00\x01\x09EOF";

    let err = PatchApplier::new(SilentProgress, false)
        .apply(patch, &original, &output)
        .unwrap_err();
    assert!(matches!(err, ApplyError::CreateFileFailed { .. }));
    assert_eq!(fs::read(&output).unwrap(), b"keep me");

    let summary = PatchApplier::new(SilentProgress, true)
        .apply(patch, &original, &output)
        .unwrap();
    assert_eq!(summary.final_len, 8);
    assert_eq!(fs::read(&output).unwrap(), [0, 0, 9, 0, 0, 0, 0, 0]);
}
