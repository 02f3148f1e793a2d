use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::PathBuf;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Inputs are generated into the temporary directory rather than shipped,
// which also insulates us against newline substitutions inserted by git.
fn stage_input(temp_dir: &tempfile::TempDir,name: &str,data: &[u8]) -> Result<PathBuf,Box<dyn std::error::Error>> {
    let path = temp_dir.path().join(name);
    std::fs::write(&path,data)?;
    Ok(path)
}

fn round_trip_test(data: &[u8]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = stage_input(&temp_dir,"original.bin",data)?;
    let par_path = temp_dir.path().join("original.bin.par");
    let out_path = temp_dir.path().join("restored.bin");
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&par_path)
        .assert()
        .success();
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("expand")
        .arg("-i").arg(&par_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(&in_path),std::fs::read(&out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with original")
    }
    Ok(())
}

#[test]
fn text_round_trip() -> STDRESULT {
    let text = "I am Sam. Sam I am. I do not like this Sam I am.\n".repeat(40);
    round_trip_test(text.as_bytes())
}

#[test]
fn binary_round_trip() -> STDRESULT {
    let mut data = Vec::new();
    for i in 0..4096 {
        data.push((i*31%251) as u8);
    }
    round_trip_test(&data)
}

#[test]
fn uniform_input_is_rejected() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = stage_input(&temp_dir,"uniform.bin",&[0;100])?;
    let par_path = temp_dir.path().join("uniform.bin.par");
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&par_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("InsufficientAlphabet"));
    Ok(())
}

#[test]
fn corrupt_archive_is_rejected() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = stage_input(&temp_dir,"not_an_archive.par","this is not a compressed file".as_bytes())?;
    let out_path = temp_dir.path().join("restored.bin");
    let mut cmd = Command::cargo_bin("huffpack")?;
    cmd.arg("expand")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure();
    Ok(())
}
