// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod prefs;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use polizza_app::AppState;
use runtime::{ApiRuntime, DemoRuntime};
use std::env;
use std::path::PathBuf;

const DEMO_SEED: u64 = 1;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `polizza --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let prefs_dir = prefs::default_prefs_dir()?;
    let prefs_path = prefs::prefs_path(&prefs_dir, config.user_id());
    if options.print_prefs_path {
        println!("{}", prefs_path.display());
        return Ok(());
    }

    let client = if options.demo {
        None
    } else {
        Some(
            polizza_api::Client::new(config.base_url(), config.token(), config.timeout()?)
                .with_context(|| {
                    format!(
                        "invalid [api] config in {}; fix base_url/token/timeout values",
                        options.config_path.display()
                    )
                })?,
        )
    };
    if options.check_only {
        return Ok(());
    }

    let mut state = AppState {
        active_tab: config.start_tab(),
        ..AppState::default()
    };
    let mut invoice_prefs = prefs::load_invoice_prefs(&prefs_path);

    let result = match client {
        Some(client) => {
            let mut runtime = ApiRuntime::new(client);
            polizza_tui::run_app(&mut state, &mut runtime, &mut invoice_prefs)
        }
        None => {
            let mut runtime = DemoRuntime::new(DEMO_SEED);
            polizza_tui::run_app(&mut state, &mut runtime, &mut invoice_prefs)
        }
    };

    // Preferences are worth keeping even when the UI exits with an error.
    prefs::save_invoice_prefs(&prefs_path, &invoice_prefs)?;
    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_prefs_path: bool,
    print_example: bool,
    demo: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args(
    args: impl Iterator<Item = String>,
    default_config_path: PathBuf,
) -> Result<CliOptions> {
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_prefs_path: false,
        print_example: false,
        demo: false,
        check_only: false,
        show_help: false,
    };

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => options.show_help = true,
            "--print-config-path" => options.print_config_path = true,
            "--print-prefs-path" => options.print_prefs_path = true,
            "--print-example-config" => options.print_example = true,
            "--demo" => options.demo = true,
            "--check" => options.check_only = true,
            other => bail!("unknown argument {other:?}; run `polizza --help` for usage"),
        }
    }

    Ok(options)
}

fn print_help() {
    println!(
        "polizza -- terminal back office for insurance policies, claims, and invoices

USAGE:
    polizza [OPTIONS]

OPTIONS:
    --demo                  run against seeded in-memory data, no backend
    --check                 validate config and API client setup, then exit
    --print-config-path     print the config file location and exit
    --print-prefs-path      print the invoice-tab preferences file and exit
    --print-example-config  print a config template and exit
    -h, --help              show this help

ENVIRONMENT:
    POLIZZA_CONFIG_PATH     override the config file location
    POLIZZA_DATA_DIR        override the preferences directory"
    );
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn args(values: &[&str]) -> std::vec::IntoIter<String> {
        values
            .iter()
            .map(|value| (*value).to_owned())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn no_args_yields_defaults() -> Result<()> {
        let options = parse_cli_args(args(&[]), PathBuf::from("/etc/polizza/config.toml"))?;
        assert_eq!(
            options,
            CliOptions {
                config_path: PathBuf::from("/etc/polizza/config.toml"),
                print_config_path: false,
                print_prefs_path: false,
                print_example: false,
                demo: false,
                check_only: false,
                show_help: false,
            },
        );
        Ok(())
    }

    #[test]
    fn flags_parse_independently() -> Result<()> {
        let options = parse_cli_args(
            args(&["--demo", "--check", "--print-prefs-path"]),
            PathBuf::from("/tmp/config.toml"),
        )?;
        assert!(options.demo);
        assert!(options.check_only);
        assert!(options.print_prefs_path);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn help_flags_parse() -> Result<()> {
        for flag in ["--help", "-h"] {
            let options = parse_cli_args(args(&[flag]), PathBuf::from("/tmp/config.toml"))?;
            assert!(options.show_help);
        }
        Ok(())
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let error = parse_cli_args(args(&["--bogus"]), PathBuf::from("/tmp/config.toml"))
            .expect_err("unknown flag should fail");
        assert!(error.to_string().contains("--bogus"));
        assert!(error.to_string().contains("--help"));
    }
}
