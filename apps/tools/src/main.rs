use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{OrganizationId, Role, UserId};
use storage::{NewUser, Storage, TenderFilter};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/bidconnect.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        email: String,
        password: String,
        /// ADMIN, OWNER or SUPPLIER
        role: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    ListUsers,
    ListTenders {
        #[arg(long, conflicts_with = "organization")]
        owner: Option<i64>,
        #[arg(long)]
        organization: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser {
            email,
            password,
            role,
            first_name,
            last_name,
        } => {
            let role: Role = role.parse().context("invalid role")?;
            let user_id = storage
                .create_user(&NewUser {
                    email,
                    first_name,
                    last_name,
                    role,
                    password,
                })
                .await?;
            println!("created user_id={user_id} role={role}");
        }
        Command::ListUsers => {
            for user in storage.list_users().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    user.id,
                    user.role,
                    user.email,
                    user.display_name()
                );
            }
        }
        Command::ListTenders {
            owner,
            organization,
        } => {
            let filter = match (owner, organization) {
                (Some(owner), _) => TenderFilter::Owner(UserId(owner)),
                (None, Some(org)) => TenderFilter::Organization(OrganizationId(org)),
                (None, None) => TenderFilter::All,
            };
            for tender in storage.list_tenders(filter).await? {
                println!(
                    "{}\t{}\t{}\tdeadline={}\tcriteria={}",
                    tender.id,
                    tender.status,
                    tender.title,
                    tender.deadline,
                    tender.criteria.len()
                );
            }
        }
    }

    Ok(())
}
