use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use client_core::{
    dashboard::{days_remaining, urgency, Urgency},
    forms::{BidForm, LoginForm, TenderForm},
    registry::{DocumentUpload, TenderRegistry},
    routing::navigate,
    settings::{BackendKind, ClientSettings},
    storage::MemoryStore,
    App,
};
use shared::domain::{Submission, SubmissionId, SubmissionStatus, Tender, TenderId, TenderStatus};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bidconnect", about = "BidConnect tender client")]
struct Cli {
    /// Settings file; defaults to ./bidconnect.toml when present.
    #[arg(long)]
    settings: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login { email: String, password: String },
    Logout,
    Whoami,
    /// Resolves a path through the role guard.
    Navigate { path: String },
    #[command(subcommand)]
    Tender(TenderCommand),
    #[command(subcommand)]
    Bid(BidCommand),
    /// Platform counts per status (admin).
    Overview,
    /// Runs an owner, supplier and admin walkthrough against the in-memory backend.
    Demo,
}

#[derive(Subcommand, Debug)]
enum TenderCommand {
    /// Owner: own tenders. Supplier: published opportunities.
    List,
    Show { id: i64 },
    Create(CreateTender),
    Publish { id: i64 },
    Close { id: i64 },
    Delete { id: i64 },
}

#[derive(Args, Debug)]
struct CreateTender {
    #[arg(long)]
    title: String,
    #[arg(long)]
    description: String,
    /// yyyy-mm-dd
    #[arg(long)]
    deadline: NaiveDate,
    #[arg(long, default_value_t = 40)]
    price_weight: u32,
    #[arg(long, default_value_t = 35)]
    technical_weight: u32,
    #[arg(long, default_value_t = 25)]
    delivery_weight: u32,
    #[arg(long = "file")]
    files: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum BidCommand {
    Submit(SubmitBid),
    /// Supplier: own bids.
    Mine,
    Withdraw { id: SubmissionId },
    /// Owner: bids received on a tender.
    Received { tender_id: i64 },
    Accept { id: SubmissionId },
    Reject { id: SubmissionId },
    Evaluate { id: SubmissionId },
}

#[derive(Args, Debug)]
struct SubmitBid {
    tender_id: i64,
    #[arg(long)]
    price: f64,
    #[arg(long)]
    technical: f64,
    #[arg(long)]
    deadline: f64,
    #[arg(long)]
    description: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let settings = ClientSettings::load(cli.settings.as_deref())?;

    let app = App::compose(settings.clone())?;
    app.session.init().await;

    match cli.command {
        Command::Login { email, password } => {
            let request = LoginForm { email, password }.validate()?;
            let outcome = app.session.login(&request).await?;
            println!(
                "signed in as {} ({}), continue at {}",
                outcome.identity.display_name(),
                outcome.identity.role,
                outcome.redirect.path()
            );
        }
        Command::Logout => {
            let next = app.session.logout().await;
            println!("signed out, continue at {}", next.path());
        }
        Command::Whoami => match app.session.identity().await {
            Some(identity) => println!(
                "{} <{}> id={} role={}",
                identity.display_name(),
                identity.email,
                identity.id,
                identity.role
            ),
            None => println!("not signed in"),
        },
        Command::Navigate { path } => {
            println!("{}", navigate(&app.session, &path).await.path());
        }
        Command::Tender(command) => tender_command(&app, command).await?,
        Command::Bid(command) => bid_command(&app, command).await?,
        Command::Overview => overview(&app).await?,
        Command::Demo => demo(settings).await?,
    }

    Ok(())
}

async fn tender_command(app: &App, command: TenderCommand) -> Result<()> {
    match command {
        TenderCommand::List => {
            if let Ok(mut supplier) = app.supplier_dashboard().await {
                supplier.load_opportunities().await;
                fail_on(supplier.error())?;
                let today = Utc::now().date_naive();
                for tender in supplier.opportunities() {
                    let days = days_remaining(tender.deadline, today);
                    let band = match urgency(days) {
                        Urgency::Urgent => "urgent",
                        Urgency::Warning => "soon",
                        Urgency::Normal => "open",
                    };
                    print_tender(tender);
                    println!("    {days} day(s) left [{band}]");
                }
                return Ok(());
            }
            let mut owner = app.owner_dashboard().await?;
            owner.load_tenders().await;
            fail_on(owner.error())?;
            for tender in owner.tenders() {
                print_tender(tender);
            }
            println!(
                "{} published, {} draft",
                owner.published_count(),
                owner.draft_count()
            );
        }
        TenderCommand::Show { id } => {
            let tender = app.tenders.get(TenderId(id)).await?;
            print_tender(&tender);
            println!("    {}", tender.description);
            for criterion in &tender.criteria {
                println!("    {:<12} {:>3}%", criterion.criterion_type, criterion.weight);
            }
            for document in &tender.documents {
                println!("    document {} -> {}", document.file_name, document.download_url);
            }
        }
        TenderCommand::Create(args) => {
            let mut owner = app.owner_dashboard().await?;
            owner.switch_to_create();
            owner.form = TenderForm {
                title: args.title,
                description: args.description,
                deadline: Some(args.deadline),
                price_weight: args.price_weight,
                technical_weight: args.technical_weight,
                delivery_weight: args.delivery_weight,
            };
            for path in &args.files {
                owner.files.push(read_upload(path).await?);
            }
            let tender = owner.submit_form().await?;
            println!("created tender {} ({})", tender.id, tender.status);
        }
        TenderCommand::Publish { id } => {
            let tender = app.owner_dashboard().await?.publish(TenderId(id)).await?;
            println!("tender {} is now {}", tender.id, tender.status);
        }
        TenderCommand::Close { id } => {
            let tender = app.owner_dashboard().await?.close(TenderId(id)).await?;
            println!("tender {} is now {}", tender.id, tender.status);
        }
        TenderCommand::Delete { id } => {
            app.owner_dashboard().await?.delete(TenderId(id)).await?;
            println!("tender {id} deleted");
        }
    }
    Ok(())
}

async fn bid_command(app: &App, command: BidCommand) -> Result<()> {
    match command {
        BidCommand::Submit(args) => {
            let mut supplier = app.supplier_dashboard().await?;
            let form = BidForm {
                price: Some(args.price),
                technical: Some(args.technical),
                deadline: Some(args.deadline),
                description: args.description,
            };
            let submission = supplier.submit_bid(TenderId(args.tender_id), &form).await?;
            println!("bid {} submitted", submission.id);
        }
        BidCommand::Mine => {
            let mut supplier = app.supplier_dashboard().await?;
            supplier.show_my_submissions().await;
            fail_on(supplier.error())?;
            for submission in supplier.my_submissions() {
                print_submission(submission);
            }
        }
        BidCommand::Withdraw { id } => {
            app.supplier_dashboard().await?.withdraw(id).await?;
            println!("bid {id} withdrawn");
        }
        BidCommand::Received { tender_id } => {
            let mut owner = app.owner_dashboard().await?;
            owner.load_tenders().await;
            owner.view_details(TenderId(tender_id)).await;
            fail_on(owner.error())?;
            for submission in owner.submissions() {
                print_submission(submission);
            }
        }
        BidCommand::Accept { id } => decide(app, id, SubmissionStatus::Accepted).await?,
        BidCommand::Reject { id } => decide(app, id, SubmissionStatus::Rejected).await?,
        BidCommand::Evaluate { id } => {
            let submission = app.owner_dashboard().await?.evaluate_submission(id).await?;
            print_submission(&submission);
        }
    }
    Ok(())
}

async fn decide(app: &App, id: SubmissionId, status: SubmissionStatus) -> Result<()> {
    let submission = app
        .owner_dashboard()
        .await?
        .update_submission_status(id, status)
        .await?;
    println!("bid {} is now {}", submission.id, submission.status);
    Ok(())
}

async fn overview(app: &App) -> Result<()> {
    let mut admin = app.admin_dashboard().await?;
    admin.load().await;
    fail_on(admin.error())?;
    println!("tenders: {}", admin.tenders().len());
    for status in [
        TenderStatus::Draft,
        TenderStatus::Published,
        TenderStatus::Closed,
        TenderStatus::Cancelled,
    ] {
        println!("  {:<10} {}", status, admin.tender_count(status));
    }
    println!("submissions: {}", admin.submissions().len());
    for status in [
        SubmissionStatus::Submitted,
        SubmissionStatus::InEvaluation,
        SubmissionStatus::Accepted,
        SubmissionStatus::Rejected,
    ] {
        println!("  {:<14} {}", status, admin.submission_count(status));
    }
    Ok(())
}

async fn demo(mut settings: ClientSettings) -> Result<()> {
    settings.backend = BackendKind::Mock;
    settings.mock_latency_ms = settings.mock_latency_ms.min(200);
    let app = App::with_store(settings, Arc::new(MemoryStore::new()))?;

    let login = |email: &str| LoginForm {
        email: email.to_string(),
        password: "demo-password".to_string(),
    };

    let outcome = app.session.login(&login("owner@city.gov").validate()?).await?;
    info!(route = outcome.redirect.path(), "demo: owner signed in");
    let mut owner = app.owner_dashboard().await?;
    owner.switch_to_create();
    owner.form = TenderForm {
        title: "Street lighting retrofit".into(),
        description: "Replace 1,200 sodium street lamps with LED fixtures".into(),
        deadline: Some(Utc::now().date_naive() + chrono::Days::new(21)),
        ..TenderForm::default()
    };
    let tender = owner.submit_form().await?;
    let tender = owner.publish(tender.id).await?;
    println!("owner published tender {} '{}'", tender.id, tender.title);
    app.session.logout().await;

    app.session.login(&login("sales@lumen.io").validate()?).await?;
    let mut supplier = app.supplier_dashboard().await?;
    supplier.load_opportunities().await;
    println!("supplier sees {} open tender(s)", supplier.opportunities().len());
    let bid = supplier
        .submit_bid(
            tender.id,
            &BidForm {
                price: Some(85.0),
                technical: Some(78.0),
                deadline: Some(90.0),
                description: "LED retrofit in 10 weeks with 5 year warranty".into(),
            },
        )
        .await?;
    println!("supplier submitted bid {}", bid.id);
    app.session.logout().await;

    app.session.login(&login("owner@city.gov").validate()?).await?;
    let mut owner = app.owner_dashboard().await?;
    owner.load_tenders().await;
    owner.view_details(tender.id).await;
    let evaluated = owner.evaluate_submission(bid.id).await?;
    owner
        .update_submission_status(bid.id, SubmissionStatus::Accepted)
        .await?;
    println!(
        "owner accepted bid {} with score {:.2}",
        evaluated.id,
        evaluated.score.unwrap_or_default()
    );
    app.session.logout().await;

    app.session.login(&login("admin@bidconnect.io").validate()?).await?;
    overview(&app).await
}

async fn read_upload(path: &Path) -> Result<DocumentUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("attachment path has no file name")?
        .to_string();
    let content_type = match path.extension().and_then(|ext| ext.to_str()) {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("csv") => "text/csv",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    };
    Ok(DocumentUpload {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}

fn fail_on(error: Option<&str>) -> Result<()> {
    match error {
        Some(message) => bail!("{message}"),
        None => Ok(()),
    }
}

fn print_tender(tender: &Tender) {
    println!(
        "#{:<4} {:<10} {} (deadline {})",
        tender.id.0, tender.status, tender.title, tender.deadline
    );
}

fn print_submission(submission: &Submission) {
    let score = submission
        .score
        .map(|score| format!("{score:.2}"))
        .unwrap_or_else(|| "-".into());
    println!(
        "{} tender={} {:<13} price={} technical={} deadline={} score={}",
        submission.id,
        submission.tender_id,
        submission.status,
        submission.price,
        submission.technical,
        submission.deadline,
        score
    );
}
