use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const SAM: &str = "I am Sam. Sam I am. I do not like this Sam I am.\n";

// Write test data into the temporary directory, repeated to give the coders something to find.
fn make_input(temp_dir: &tempfile::TempDir,name: &str,reps: usize) -> Result<(PathBuf,Vec<u8>),Box<dyn std::error::Error>> {
    let txt = SAM.repeat(reps).into_bytes();
    let path = temp_dir.path().join(name);
    std::fs::write(&path,&txt)?;
    Ok((path,txt))
}

fn round_trip_test(method: &str,reps: usize) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let (in_path,txt) = make_input(&temp_dir,"sam.txt",reps)?;
    let cmp_path = temp_dir.path().join("sam.cmp");
    let out_path = temp_dir.path().join("sam.out");
    Command::cargo_bin("bytecoders")?
        .arg("compress")
        .arg("-m").arg(method)
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .assert()
        .success()
        .stderr(predicate::str::contains(format!("compressed {} into",txt.len())));
    Command::cargo_bin("bytecoders")?
        .arg("expand")
        .arg("-m").arg(method)
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(&cmp_path),std::fs::read(&out_path)) {
        (Ok(compressed),Ok(expanded)) => {
            if reps > 1 {
                assert!(compressed.len() < txt.len());
            }
            assert_eq!(expanded,txt);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

#[test]
fn lz77_round_trip() -> STDRESULT {
    round_trip_test("lz77",1)?;
    round_trip_test("lz77",40)
}

#[test]
fn huffman_round_trip() -> STDRESULT {
    round_trip_test("huffman",1)?;
    round_trip_test("huffman",40)
}

#[test]
fn print_triples() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("run.txt");
    std::fs::write(&in_path,"aaaaaa")?;
    Command::cargo_bin("bytecoders")?
        .arg("compress")
        .arg("-m").arg("lz77")
        .arg("--window").arg("6")
        .arg("--lookahead").arg("5")
        .arg("-p")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("run.cmp"))
        .assert()
        .success()
        .stdout("(0,0,97)\n(1,5,-)\n");
    Ok(())
}

#[test]
fn bad_lookahead() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let (in_path,_) = make_input(&temp_dir,"sam.txt",1)?;
    Command::cargo_bin("bytecoders")?
        .arg("compress")
        .arg("-m").arg("lz77")
        .arg("--lookahead").arg("256")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("sam.cmp"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("LookaheadTooLarge(256)"));
    Ok(())
}

#[test]
fn corrupt_input() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let (in_path,_) = make_input(&temp_dir,"sam.txt",1)?;
    Command::cargo_bin("bytecoders")?
        .arg("expand")
        .arg("-m").arg("lz77")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("sam.out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("FileFormatMismatch"));
    Ok(())
}

#[test]
fn stats() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let (in_path,_) = make_input(&temp_dir,"sam.txt",10)?;
    Command::cargo_bin("bytecoders")?
        .arg("stats")
        .arg(&in_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("(490 bytes)"))
        .stdout(predicate::str::contains("lz77"))
        .stdout(predicate::str::contains("huffman"));
    Ok(())
}

#[test]
fn expand_with_limits() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let (in_path,txt) = make_input(&temp_dir,"sam.txt",4)?;
    let cmp_path = temp_dir.path().join("sam.cmp");
    let out_path = temp_dir.path().join("sam.out");
    Command::cargo_bin("bytecoders")?
        .arg("compress")
        .arg("-m").arg("lz77")
        .arg("--window").arg("6")
        .arg("--lookahead").arg("5")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .assert()
        .success();
    Command::cargo_bin("bytecoders")?
        .arg("expand")
        .arg("-m").arg("lz77")
        .arg("--window").arg("6")
        .arg("--lookahead").arg("5")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success()
        .stderr(predicate::str::contains(format!("into {}",txt.len())));
    assert_eq!(std::fs::read(&out_path)?,txt);
    Command::cargo_bin("bytecoders")?
        .arg("expand")
        .arg("-m").arg("lz77")
        .arg("--lookahead").arg("256")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(temp_dir.path().join("sam.bad"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("LookaheadTooLarge(256)"));
    Ok(())
}

#[test]
fn stats_baseline_and_sweep() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let (in_path,_) = make_input(&temp_dir,"sam.txt",10)?;
    Command::cargo_bin("bytecoders")?
        .arg("stats")
        .arg("--baseline")
        .arg("--sweep")
        .arg(&in_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("random baseline (490 bytes)"))
        .stdout(predicate::str::contains("lz77 w=255 l=15"))
        .stdout(predicate::str::contains("lz77 w=65535 l=255"));
    Ok(())
}
