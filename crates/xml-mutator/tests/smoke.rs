//! Replays the bundled seed corpus through the mutator 1000 times per seed file, the same
//! smoke test the CLI's `fuzz` subcommand runs by hand — the Rust equivalent of the original
//! plugin's `__main__` block.

use std::path::Path;

fn read_corpus(dir: &Path) -> Vec<Vec<u8>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        if entry.path().is_file() {
            files.push(std::fs::read(entry.path()).unwrap());
        }
    }
    files.sort();
    files
}

#[test]
fn replaying_the_bundled_corpus_drives_every_exercised_strategy_to_full_success() {
    let corpus_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/corpus");
    let seeds = read_corpus(&corpus_dir);
    assert!(!seeds.is_empty(), "no seed files found in {}", corpus_dir.display());

    let executable_dir = tempfile::tempdir().unwrap();
    let executable_dir = executable_dir.path();

    unsafe {
        std::env::set_var("INPUT_DIR", &corpus_dir);
        std::env::set_var("BACKUP_DIR", executable_dir.join("backup"));
        std::env::set_var("CFG_DIR", executable_dir.join("config"));
        std::env::set_var("DONT_RESTORE", "1");
    }

    let mut mutator = xml_mutator::init::init(b"smoke-test-seed", executable_dir).unwrap();

    let iterations = seeds.len() * 1000;
    for i in 0..iterations {
        let seed = &seeds[i % seeds.len()];
        mutator.fuzz(seed, &[], 65536);
    }
    mutator.deinit();

    unsafe {
        std::env::remove_var("INPUT_DIR");
        std::env::remove_var("BACKUP_DIR");
        std::env::remove_var("CFG_DIR");
        std::env::remove_var("DONT_RESTORE");
    }

    let mut exercised = 0;
    for (identifier, record) in mutator.stats() {
        if record.execs == 0 {
            continue;
        }
        exercised += 1;
        assert_eq!(
            record.percent_successful_mut, 1.0,
            "strategy {identifier} only succeeded {}/{} times",
            record.successful_mut, record.execs
        );
    }
    assert!(exercised > 0, "no strategy was exercised by the replay");
}
