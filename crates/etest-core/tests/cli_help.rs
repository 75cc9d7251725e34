//! CLI help output tests for etest.
//!
//! Every command must display its help text without errors.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;

fn etest() -> Command {
    cargo_bin_cmd!("etest")
}

mod top_level {
    use super::*;

    #[test]
    fn help_flag_works() {
        etest()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("E-test"));
    }

    #[test]
    fn help_subcommand_works() {
        etest()
            .arg("help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Usage"));
    }

    #[test]
    fn version_flag_works() {
        etest()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("etest"));
    }

    #[test]
    fn help_shows_all_commands() {
        etest()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("pvalue"))
            .stdout(predicate::str::contains("calibrate"))
            .stdout(predicate::str::contains("walk"))
            .stdout(predicate::str::contains("version"));
    }

    #[test]
    fn help_shows_global_options() {
        etest()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--format"))
            .stdout(predicate::str::contains("--verbose"))
            .stdout(predicate::str::contains("--log-format"));
    }

    #[test]
    fn missing_subcommand_is_an_args_error() {
        etest().assert().code(10);
    }
}

mod subcommands {
    use super::*;

    #[test]
    fn pvalue_help() {
        etest()
            .args(["pvalue", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--n1"))
            .stdout(predicate::str::contains("--side"))
            .stdout(predicate::str::contains("--truncation"))
            .stdout(predicate::str::contains("--alpha"));
    }

    #[test]
    fn calibrate_help() {
        etest()
            .args(["calibrate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--config"))
            .stdout(predicate::str::contains("--mu-lower"))
            .stdout(predicate::str::contains("--trials"))
            .stdout(predicate::str::contains("--serial"))
            .stdout(predicate::str::contains("--plot-width"));
    }

    #[test]
    fn walk_help() {
        etest()
            .args(["walk", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("LAMBDA"));
    }
}
