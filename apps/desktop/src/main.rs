use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client_core::{BackendClient, FailurePolicy, FormModel, SubmitEvent, SubmitHandler};
use serde::Serialize;
use shared::{
    domain::{LicenseId, LicenseeId, OwnerId, SongId},
    protocol::{LicensePayload, LicenseePayload, OwnerPayload, SongPayload},
};

#[derive(Parser, Debug)]
#[command(about = "Command-line client for the music licensing backend")]
struct Args {
    #[arg(long, env = "BACKEND_URL", default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit the greeting form with the given name.
    Greet {
        #[arg(long, default_value = "")]
        name: String,
        /// Leave the submit control disabled when the call fails.
        #[arg(long)]
        leave_disabled_on_failure: bool,
    },
    Songs,
    Song {
        song_id: i64,
    },
    SongOwner {
        song_id: i64,
    },
    CreateSong {
        #[arg(long)]
        title: String,
        #[arg(long)]
        artist: String,
        #[arg(long)]
        owner_id: i64,
        #[arg(long)]
        year: u32,
        #[arg(long)]
        genre: String,
        #[arg(long)]
        price: u32,
    },
    CreateOwner {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        auth_key: String,
    },
    OwnerRequests {
        owner_id: i64,
    },
    CreateLicensee {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    Licensee {
        licensee_id: i64,
    },
    LicenseeLicenses {
        licensee_id: i64,
    },
    RequestLicense {
        #[arg(long)]
        song_id: i64,
        #[arg(long)]
        licensee_id: i64,
        #[arg(long)]
        price: u32,
        /// RFC 3339 timestamp, e.g. 2024-01-01T00:00:00Z
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
    },
    License {
        license_id: i64,
    },
    Approve {
        license_id: i64,
        #[arg(long, env = "OWNER_AUTH_KEY")]
        auth_key: String,
    },
    Revoke {
        license_id: i64,
        #[arg(long, env = "OWNER_AUTH_KEY")]
        auth_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let client = BackendClient::new(&args.server_url)?;

    match args.command {
        Command::Greet {
            name,
            leave_disabled_on_failure,
        } => {
            let policy = if leave_disabled_on_failure {
                FailurePolicy::LeaveDisabled
            } else {
                FailurePolicy::ReenableAndReport
            };
            greet_through_form(client, name, policy).await?;
        }
        Command::Songs => print_json(&client.list_songs().await?)?,
        Command::Song { song_id } => print_json(&client.get_song(SongId(song_id)).await?)?,
        Command::SongOwner { song_id } => {
            print_json(&client.get_song_owner(SongId(song_id)).await?)?
        }
        Command::CreateSong {
            title,
            artist,
            owner_id,
            year,
            genre,
            price,
        } => {
            let song = client
                .create_song(&SongPayload {
                    title,
                    artist,
                    owner_id: OwnerId(owner_id),
                    year,
                    genre,
                    price,
                })
                .await?;
            print_json(&song)?;
        }
        Command::CreateOwner {
            name,
            email,
            auth_key,
        } => {
            let owner = client
                .create_owner(&OwnerPayload {
                    name,
                    email,
                    auth_key,
                })
                .await?;
            print_json(&owner)?;
        }
        Command::OwnerRequests { owner_id } => {
            print_json(&client.owner_license_requests(OwnerId(owner_id)).await?)?
        }
        Command::CreateLicensee { name, email } => {
            let licensee = client
                .create_licensee(&LicenseePayload { name, email })
                .await?;
            print_json(&licensee)?;
        }
        Command::Licensee { licensee_id } => {
            print_json(&client.get_licensee(LicenseeId(licensee_id)).await?)?
        }
        Command::LicenseeLicenses { licensee_id } => {
            print_json(&client.licensee_licenses(LicenseeId(licensee_id)).await?)?
        }
        Command::RequestLicense {
            song_id,
            licensee_id,
            price,
            start,
            end,
        } => {
            let license = client
                .request_license(&LicensePayload {
                    song_id: SongId(song_id),
                    licensee_id: LicenseeId(licensee_id),
                    price,
                    start_time: start,
                    end_time: end,
                })
                .await?;
            print_json(&license)?;
        }
        Command::License { license_id } => {
            print_json(&client.get_license(LicenseId(license_id)).await?)?
        }
        Command::Approve {
            license_id,
            auth_key,
        } => print_json(
            &client
                .approve_license(LicenseId(license_id), &auth_key)
                .await?,
        )?,
        Command::Revoke {
            license_id,
            auth_key,
        } => print_json(
            &client
                .revoke_license(LicenseId(license_id), &auth_key)
                .await?,
        )?,
    }

    Ok(())
}

/// Drives the same submit handler the GUI uses, with the form living in memory.
async fn greet_through_form(client: BackendClient, name: String, policy: FailurePolicy) -> Result<()> {
    let form = Arc::new(FormModel::with_name(name));
    let handler = SubmitHandler::new(Arc::new(client), form.clone(), form.clone())
        .with_failure_policy(policy);

    let event = SubmitEvent::new(form.as_ref());
    let result = handler.submit(&event).await;

    let snapshot = form.snapshot();
    if let Some(greeting) = &snapshot.greeting {
        println!("{greeting}");
    }
    if snapshot.submit_disabled {
        eprintln!("submit control left disabled after failure");
    }
    result.map(|_| ()).context("greeting form submission failed")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
