use std::path::Path;
use std::process::Command;

fn cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_psort"))
}

/// Write records of `width` bytes: native-endian key + payload bytes that
/// identify the record's input position.
fn write_records(path: &Path, keys: &[i32], width: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(keys.len() * width);
    for (i, &k) in keys.iter().enumerate() {
        data.extend_from_slice(&k.to_ne_bytes());
        data.extend((0..width - 4).map(|j| (i * 13 + j) as u8));
    }
    std::fs::write(path, &data).unwrap();
    data
}

fn keys_of(data: &[u8], width: usize) -> Vec<i32> {
    data.chunks_exact(width)
        .map(|r| i32::from_ne_bytes([r[0], r[1], r[2], r[3]]))
        .collect()
}

fn sorted_records(data: &[u8], width: usize) -> Vec<Vec<u8>> {
    let mut recs: Vec<Vec<u8>> = data.chunks_exact(width).map(|r| r.to_vec()).collect();
    recs.sort();
    recs
}

fn pseudo_random_keys(n: usize, seed: u64) -> Vec<i32> {
    let mut x = seed | 1;
    (0..n)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x as i32
        })
        .collect()
}

#[test]
fn test_psort_sorts_default_width() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    let original = write_records(&input, &pseudo_random_keys(5000, 42), 100);

    let out = cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "psort failed: {:?}", out);

    let sorted = std::fs::read(&output).unwrap();
    assert_eq!(sorted.len(), original.len());
    assert!(keys_of(&sorted, 100).windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sorted_records(&sorted, 100), sorted_records(&original, 100));

    // Input file is left untouched
    assert_eq!(std::fs::read(&input).unwrap(), original);
}

#[test]
fn test_psort_custom_width_and_parallelism() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    let original = write_records(&input, &[5, 3, 8, 1, 9, 2, 7, 4, 6, 0], 16);

    let out = cmd()
        .args(["-e", "16", "-p", "2", "-k", "3", "--seed", "7"])
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "psort failed: {:?}", out);

    let sorted = std::fs::read(&output).unwrap();
    assert_eq!(keys_of(&sorted, 16), (0..10).collect::<Vec<_>>());
    assert_eq!(sorted_records(&sorted, 16), sorted_records(&original, 16));
}

#[test]
fn test_psort_large_input_is_mapped() {
    // Above the read() threshold, so the input goes through a private mapping
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("big.bin");
    let output = dir.path().join("out.bin");
    let original = write_records(&input, &pseudo_random_keys(20_000, 9), 100);

    let out = cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success(), "psort failed: {:?}", out);

    let sorted = std::fs::read(&output).unwrap();
    assert!(keys_of(&sorted, 100).windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sorted_records(&sorted, 100), sorted_records(&original, 100));
    assert_eq!(std::fs::read(&input).unwrap(), original);
}

#[test]
fn test_psort_one_worker_matches_many() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let serial = dir.path().join("serial.bin");
    let parallel = dir.path().join("parallel.bin");
    // 4001 is prime, so every key is distinct
    let keys: Vec<i32> = (0..4000).map(|i| (i * 7919) % 4001).collect();
    write_records(&input, &keys, 32);

    for (out_path, p) in [(&serial, "1"), (&parallel, "16")] {
        let out = cmd()
            .args(["-e", "32", "-p", p])
            .args([input.to_str().unwrap(), out_path.to_str().unwrap()])
            .output()
            .unwrap();
        assert!(out.status.success(), "psort -p {} failed: {:?}", p, out);
    }
    assert_eq!(
        std::fs::read(&serial).unwrap(),
        std::fs::read(&parallel).unwrap()
    );
}

#[test]
fn test_psort_sorted_file_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    let keys: Vec<i32> = (0..3000).map(|i| i / 3).collect();
    let original = write_records(&input, &keys, 100);

    let out = cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(std::fs::read(&output).unwrap(), original);
}

#[test]
fn test_psort_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, b"").unwrap();

    let out = cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(std::fs::read(&output).unwrap().len(), 0);
}

#[test]
fn test_psort_wrong_argument_count() {
    let out = cmd().arg("only-one").output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("incorrect number of arguments"),
        "stderr: {}",
        stderr
    );

    let out = cmd().args(["a", "b", "c"]).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("incorrect number of arguments"));

    let out = cmd().output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn test_psort_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("nope.bin");
    let output = dir.path().join("out.bin");

    let out = cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("nope.bin"), "stderr: {}", stderr);
    assert!(!output.exists(), "no output on failure");
}

#[test]
fn test_psort_partial_record_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("partial.bin");
    let output = dir.path().join("out.bin");
    std::fs::write(&input, vec![1u8; 250]).unwrap();

    let out = cmd()
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("not a multiple"), "stderr: {}", stderr);
    assert!(!output.exists());
}

#[test]
fn test_psort_invalid_entry_size() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    write_records(&input, &[1, 2], 8);

    let out = cmd()
        .args(["-e", "2", input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid configuration"), "stderr: {}", stderr);
}

#[test]
fn test_psort_oversampling_overflow_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    write_records(&input, &[4, 3, 2, 1], 8);

    let k = usize::MAX.to_string();
    let out = cmd()
        .args(["-e", "8", "-p", "2", "-k", &k])
        .args([input.to_str().unwrap(), output.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid configuration"), "stderr: {}", stderr);
    assert!(!output.exists());
}

#[test]
fn test_psort_check_mode() {
    let dir = tempfile::tempdir().unwrap();
    let sorted = dir.path().join("sorted.bin");
    let unsorted = dir.path().join("unsorted.bin");
    write_records(&sorted, &[1, 2, 2, 5], 100);
    write_records(&unsorted, &[1, 4, 3, 5], 100);

    let out = cmd()
        .args(["--check", sorted.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(out.status.success());

    let out = cmd()
        .args(["-c", unsorted.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains(":3: disorder: 3"), "stderr: {}", stderr);
}

#[test]
fn test_psort_dispatch_modes_agree() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let mut keys: Vec<i32> = pseudo_random_keys(3000, 77);
    keys.sort();
    keys.dedup();
    // Reverse so there is real work to do
    keys.reverse();
    write_records(&input, &keys, 20);

    let mut results = Vec::new();
    for mode in ["thread-per-bucket", "pool", "auto"] {
        let output = dir.path().join(format!("{}.bin", mode));
        let out = cmd()
            .args(["-e", "20", "-p", "6", "--dispatch", mode])
            .args([input.to_str().unwrap(), output.to_str().unwrap()])
            .output()
            .unwrap();
        assert!(out.status.success(), "--dispatch {} failed: {:?}", mode, out);
        results.push(std::fs::read(&output).unwrap());
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);

    let out = cmd()
        .args(["--dispatch", "fork", input.to_str().unwrap(), "x.bin"])
        .output()
        .unwrap();
    assert!(!out.status.success());
}
