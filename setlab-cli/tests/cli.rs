use assert_cmd::prelude::*; // Add methods on commands
use assert_fs::{prelude::*, TempDir};
use predicates::prelude::*;
use serial_test::serial;
use setlab::{report::ReportWriter, ReportParameters, ResultsCollection, SimulationReport, Table};
use std::process::Command; // Run programs
use test_log::test;

const BIN: &str = "setlab";

fn set_table() -> Table {
    Table::new(vec![vec![0, 0], vec![0, 1], vec![0, -1]])
}

fn plain_table() -> Table {
    Table::new(vec![vec![0, 0], vec![0, 0], vec![1, 1]])
}

/// Report of alternating tables with and without a SET.
fn write_report(dir: &TempDir, name: &str, tables: usize, counts: Option<Vec<u32>>) -> String {
    let tables: Vec<Table> = (0..tables)
        .map(|i| if i % 2 == 0 { set_table() } else { plain_table() })
        .collect();
    let counts = counts.unwrap_or_else(|| (0..tables.len() as u32).map(|i| 1 - i % 2).collect());
    let parameters = ReportParameters {
        num_cards: 3,
        num_attributes: 2,
        num_tables: tables.len(),
    };

    let file = dir.child(name);
    ReportWriter::new()
        .write(file.path(), parameters, &counts, &tables)
        .unwrap();
    file.path().display().to_string()
}

#[cfg_attr(miri, ignore)]
#[test]
fn cli_argument_parsing() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("-h");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Print help"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--version");
    cmd.assert().success().stdout(predicate::str::contains(BIN));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("-v").arg("-q").arg("probability").arg("3");
    cmd.assert().failure().stderr(predicate::str::contains(
        "argument '--verbose...' cannot be used with '--quiet'",
    ));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--log").arg("cats").arg("probability").arg("3");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("'--log <LOG_LEVEL>'"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.env_remove("SETLAB_GENERATOR").arg("sweep").arg("--cards").arg("2");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--generator <EXECUTABLE>"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("sweep")
        .arg("--cards")
        .arg("2")
        .arg("--generator")
        .arg("gen")
        .arg("--reuse")
        .arg("--load");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
    Ok(())
}

#[cfg_attr(miri, ignore)]
#[test]
fn probability_table() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("probability").arg("4");
    cmd.assert().success().stdout(
        predicate::str::contains("   1  0.000000")
            .and(predicate::str::contains("   3  0.012658"))
            .and(predicate::str::contains("   4  0.050152")),
    );

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("probability").arg("10000000000");
    cmd.assert().success().stdout(
        predicate::str::contains("  15  1.000000")
            .and(predicate::str::contains("16-10000000000  1.000000"))
            .and(predicate::str::contains("  17  ").not()),
    );

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("probability").arg("-2");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("non-negative integer"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("probability").arg("2.5");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("must be an integer"));
    Ok(())
}

#[cfg_attr(miri, ignore)]
#[test]
fn parse_report() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let report = write_report(&dir, "data.txt", 3, None);

    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("parse").arg(&report).arg("--tables");
    cmd.assert().success().stdout(
        predicate::str::contains("3 cards, 2 attributes, 3 tables")
            .and(predicate::str::contains("33.3333%"))
            .and(predicate::str::contains("(3, 3, 2)")),
    );

    dir.child("broken.txt").write_str("# Parameters:\n")?;
    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("parse").arg(dir.child("broken.txt").path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Number of cards:"));
    Ok(())
}

#[cfg_attr(miri, ignore)]
#[test]
fn verify_counts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let correct = write_report(&dir, "correct.txt", 4, None);
    let wrong = write_report(&dir, "wrong.txt", 4, Some(vec![1, 1, 1, 0]));

    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("verify").arg(&correct);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SET counts confirmed"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("verify").arg(&wrong);
    cmd.assert().failure().stderr(
        predicate::str::contains("Table 1 lists 1 SETs, recount finds 0")
            .and(predicate::str::contains("1 tables have a reported SET count")),
    );
    Ok(())
}

#[cfg_attr(miri, ignore)]
#[test]
fn plot_results() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut results = ResultsCollection::new();
    results.insert(3, SimulationReport::from_counts(vec![0, 0, 1, 0]));
    results.insert(4, SimulationReport::from_counts(vec![0, 1, 2, 1, 0, 1]));
    let file = dir.child("set_results.json");
    results.save(file.path())?;

    let images = dir.child("Images");
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("plot")
        .arg("--results")
        .arg(file.path())
        .arg("--output-dir")
        .arg(images.path());
    cmd.assert().success();

    for name in ["bar3cards.svg", "bar4cards.svg", "avg_sets.svg", "prob_set.svg"] {
        images
            .child(name)
            .assert(predicate::str::contains("<svg"));
    }

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("plot")
        .arg("--results")
        .arg(file.path())
        .arg("--output-dir")
        .arg(images.path())
        .arg("--histogram")
        .arg("7");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No data found for 7 cards."));
    Ok(())
}

#[cfg_attr(miri, ignore)]
#[test]
fn train_and_evaluate() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let report = write_report(&dir, "train.txt", 10, None);
    let weights = dir.child("model.safetensors");
    let images = dir.child("Images");

    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("train")
        .arg(&report)
        .arg("--epochs")
        .arg("2")
        .arg("--batch-size")
        .arg("8")
        .arg("--weights")
        .arg(weights.path())
        .arg("--plot-dir")
        .arg(images.path())
        .arg("--test")
        .arg(&report)
        .arg("--sample-size")
        .arg("4");
    cmd.assert().success().stdout(
        predicate::str::contains("Training completed")
            .and(predicate::str::contains("Evaluated")),
    );
    weights.assert(predicate::path::exists());
    images
        .child("loss.svg")
        .assert(predicate::str::contains("<svg"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("evaluate")
        .arg(&report)
        .arg("--weights")
        .arg(weights.path())
        .arg("--sample-size")
        .arg("5")
        .arg("--sample-seed")
        .arg("3");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Evaluated"));

    cmd = Command::cargo_bin(BIN)?;
    cmd.arg("evaluate")
        .arg(&report)
        .arg("--weights")
        .arg(weights.path())
        .arg("--sample-size")
        .arg("50");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Cannot sample 50 examples"));
    Ok(())
}

#[cfg(unix)]
#[cfg_attr(miri, ignore)]
#[test]
#[serial]
fn sweep_with_fake_generator() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new()?;
    let script = dir.child("generator.sh");
    std::fs::write(
        script.path(),
        "#!/bin/sh\nread cards\nread attributes\nread tables\nread answer\n\
         printf '# Number of SETs in each Table\\n\\n0 %s \\n\\n# Probability of no SETs: 50%% \\n\\n# Average number of SETs: %s\\n' \
         \"$((cards * 2))\" \"$cards\" > data.txt\n",
    )?;
    std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755))?;

    let output = dir.child("set_results.json");
    let images = dir.child("Images");
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.env("SETLAB_GENERATOR", script.path())
        .arg("sweep")
        .arg("--cards")
        .arg("3")
        .arg("--tables")
        .arg("2")
        .arg("--work-dir")
        .arg(dir.path())
        .arg("--output")
        .arg(output.path())
        .arg("--plot-dir")
        .arg(images.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("All simulations completed!"));

    let results = ResultsCollection::load(output.path())?;
    assert_eq!(results.card_counts().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(results.get(2)?.set_counts, vec![0, 4]);
    images
        .child("prob_set.svg")
        .assert(predicate::path::exists());
    Ok(())
}
