use crate::config::{validate_name, ConfigStore, Profile, RegistrySettings};
use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use dialoguer::Select;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::io::{stdin, stdout, Write};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// List all profiles, marking the active one
    List,
    /// Print a profile
    Get { name: String },
    /// Create a profile (prompts for anything required that is missing)
    Create(CreateArgs),
    /// Make a profile the default for every command
    Activate { name: String },
    /// Delete a profile that is not active
    Delete { name: String },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub name: String,
    /// Registry address (host:port or URL)
    #[arg(long = "registry.address")]
    pub address: Option<String>,
    #[arg(long = "registry.insecure")]
    pub insecure: bool,
    #[arg(long = "registry.project")]
    pub project: Option<String>,
    #[arg(long = "registry.location")]
    pub location: Option<String>,
    /// Activate the profile after creating it
    #[arg(long)]
    pub activate: bool,
}

fn prompt(msg: &str) -> Result<String> {
    print!("{msg}: ");
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    let val = input.trim().to_string();
    if val.is_empty() {
        Err(anyhow!("{} cannot be empty", msg))
    } else {
        Ok(val)
    }
}

/// The existing profile name closest to `name`, if any is close at all.
pub fn closest_name<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    let matcher = SkimMatcherV2::default();
    candidates
        .iter()
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, name)
                .map(|score| (score, candidate.as_str()))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, candidate)| candidate)
}

pub fn run(cmd: ConfigCommands, store: &ConfigStore) -> Result<()> {
    match cmd {
        ConfigCommands::List => {
            let names = store.list()?;
            if names.is_empty() {
                println!("(no configs in {})", store.dir().display());
            }
            let active = store.active()?;
            for name in names {
                let marker = if active.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{marker} {name}");
            }
        }
        ConfigCommands::Get { name } => {
            let profile = store.load(&name)?;
            print!("{}", serde_yaml::to_string(&profile)?);
        }
        ConfigCommands::Create(args) => {
            validate_name(&args.name)?;
            if store.exists(&args.name) {
                bail!("config {:?} already exists", args.name);
            }
            let address = match args.address {
                Some(address) => address,
                None => prompt("Registry address (host:port)")?,
            };
            let insecure = if args.insecure {
                true
            } else {
                let options = ["TLS", "plain HTTP (insecure)"];
                let selection = Select::new()
                    .with_prompt("Transport")
                    .items(&options)
                    .default(0)
                    .interact()?;
                selection == 1
            };
            let profile = Profile {
                registry: RegistrySettings {
                    address,
                    insecure,
                    project: args.project,
                    location: args.location,
                    ..Default::default()
                },
            };
            store.save(&args.name, &profile)?;
            println!("Created config {:?} in {}", args.name, store.dir().display());
            if args.activate || store.active()?.is_none() {
                store.activate(&args.name)?;
                println!("Activated config {:?}", args.name);
            }
        }
        ConfigCommands::Activate { name } => {
            if !store.exists(&name) {
                let names = store.list()?;
                return match closest_name(&name, &names) {
                    Some(suggestion) => Err(anyhow!(
                        "config {name:?} does not exist; did you mean {suggestion:?}?"
                    )),
                    None => Err(anyhow!("config {name:?} does not exist")),
                };
            }
            store.activate(&name)?;
            println!("Activated config {name:?}");
        }
        ConfigCommands::Delete { name } => {
            store.delete(&name)?;
            println!("Deleted config {name:?}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_name() {
        let names = vec!["local".to_string(), "production".to_string(), "staging".to_string()];
        assert_eq!(closest_name("prod", &names), Some("production"));
        assert_eq!(closest_name("stg", &names), Some("staging"));
        assert_eq!(closest_name("zzz", &names), None);
    }

    #[test]
    fn test_create_activate_delete_without_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        run(
            ConfigCommands::Create(CreateArgs {
                name: "local".into(),
                address: Some("localhost:8080".into()),
                insecure: true,
                project: Some("demo".into()),
                location: None,
                activate: false,
            }),
            &store,
        )
        .unwrap();
        // The first config becomes active.
        assert_eq!(store.active().unwrap().as_deref(), Some("local"));
        assert_eq!(store.load("local").unwrap().registry.address, "localhost:8080");

        let err = run(ConfigCommands::Activate { name: "locl".into() }, &store).unwrap_err();
        assert!(err.to_string().contains("did you mean \"local\""));
        assert!(run(ConfigCommands::Delete { name: "local".into() }, &store).is_err());
    }
}
