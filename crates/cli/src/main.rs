use clap::{Parser, Subcommand};
use intake_core::{
    ConfiguredStore, EmailAddress, FieldName, FileRecordStore, Identity, IdentityProvider,
    IntakeConfig, IntakeError, IntakeWizard, NonEmptyText, RecordStore, StaticIdentity,
    SubmitOutcome, WizardView,
};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fallback for `--user` when the flag is not given.
const ENV_USER: &str = "INTAKE_USER";

/// Input that empties a field; an empty line keeps the current value.
const CLEAR_TOKEN: &str = "-";

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Patient intake CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a single field value
    Validate {
        /// camelCase field name, e.g. fullName
        field: String,
        /// Value to check
        value: String,
    },
    /// Register a patient interactively
    Register {
        /// Identifier of the signed-in user (defaults to $INTAKE_USER)
        #[arg(long)]
        user: Option<String>,
        /// Email of the signed-in user (optional)
        #[arg(long)]
        email: Option<String>,
    },
    /// List registrations in the local file store
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = IntakeConfig::from_lookup(|key| std::env::var(key).ok())?;

    match cli.command {
        Some(Commands::Validate { field, value }) => {
            let field: FieldName = field.parse()?;
            let today = chrono::Local::now().date_naive();
            match config.validator().validate(field, &value, today) {
                None => println!("{}: valid", field),
                Some(message) => println!("{}: {}", field, message),
            }
        }
        Some(Commands::Register { user, email }) => {
            let user = user.or_else(|| std::env::var(ENV_USER).ok());
            let identity = identity_from_args(user, email)?;
            let store = ConfiguredStore::from_config(&config)?;
            let mut wizard = IntakeWizard::new(&config);

            let stdin = io::stdin();
            if let Some(id) =
                run_register(&mut wizard, &identity, &store, stdin.lock(), io::stdout()).await?
            {
                tracing::info!("registered patient as {}", id);
            }
        }
        Some(Commands::List) => {
            let Some(data_dir) = config.patient_data_dir() else {
                anyhow::bail!("'intake list' is only available with the file store");
            };
            let store = FileRecordStore::new(data_dir);
            let documents = store.list(config.collection().as_str())?;
            if documents.is_empty() {
                println!("No registrations found.");
            } else {
                for stored in documents {
                    println!(
                        "ID: {}, Name: {}, Created by: {}, Created: {}",
                        stored.id,
                        stored.document.record.personal.full_name,
                        stored.document.created_by,
                        stored.document.created_at.to_rfc3339()
                    );
                }
            }
        }
        None => {
            println!("Use 'intake --help' for commands");
        }
    }

    Ok(())
}

fn identity_from_args(
    user: Option<String>,
    email: Option<String>,
) -> anyhow::Result<StaticIdentity> {
    let Some(uid) = user.and_then(|u| NonEmptyText::new(u).ok()) else {
        return Ok(StaticIdentity::anonymous());
    };

    let mut identity = Identity::new(uid);
    if let Some(email) = email {
        identity = identity.with_email(EmailAddress::parse(&email)?);
    }
    Ok(StaticIdentity::signed_in(identity))
}

fn options_hint(field: FieldName) -> Option<&'static str> {
    match field {
        FieldName::Gender => Some("male/female/other"),
        FieldName::BloodGroup => Some("A+/A-/B+/B-/AB+/AB-/O+/O-"),
        FieldName::Dob => Some("YYYY-MM-DD"),
        _ => None,
    }
}

/// Reads one line; `None` at end of input.
fn read_line(input: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Runs the wizard against a line-oriented terminal.
///
/// Each round prints the current step, prompts its fields (an empty line keeps the current
/// value, `-` clears it) and then asks for a command. Returns the stored document id once the registration
/// is accepted, or `None` if the user quits or input ends.
async fn run_register(
    wizard: &mut IntakeWizard,
    identity: &impl IdentityProvider,
    store: &impl RecordStore,
    mut input: impl BufRead,
    mut output: impl Write,
) -> anyhow::Result<Option<String>> {
    loop {
        let step = match wizard.view() {
            WizardView::Confirmation { document_id } => {
                writeln!(output, "Patient registered. Document id: {}", document_id)?;
                return Ok(Some(document_id.to_string()));
            }
            WizardView::Step(step) => step,
        };

        writeln!(output)?;
        writeln!(output, "{}", step)?;
        writeln!(output, "(Enter keeps a value, '{}' clears it)", CLEAR_TOKEN)?;
        if let Some(banner) = wizard.banner() {
            writeln!(output, "! {}", banner)?;
        }

        for &field in step.fields() {
            if let Some(message) = wizard.errors().get(field) {
                writeln!(output, "  ! {}", message)?;
            }

            if field.is_derived() {
                writeln!(output, "  {}: {}", field.label(), wizard.draft().value(field))?;
                continue;
            }

            loop {
                let hint = options_hint(field)
                    .map(|h| format!(" ({h})"))
                    .unwrap_or_default();
                write!(
                    output,
                    "  {}{} [{}]: ",
                    field.label(),
                    hint,
                    wizard.draft().value(field)
                )?;
                output.flush()?;

                let Some(line) = read_line(&mut input)? else {
                    return Ok(None);
                };
                if line.is_empty() {
                    break;
                }
                let value = if line.trim() == CLEAR_TOKEN {
                    String::new()
                } else {
                    line
                };
                match wizard.set_field(field, value) {
                    Ok(()) => break,
                    Err(e @ IntakeError::UnknownOption { .. }) => writeln!(output, "  {}", e)?,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        write!(output, "[n]ext, [p]revious, [s]ubmit, [q]uit: ")?;
        output.flush()?;
        let Some(command) = read_line(&mut input)? else {
            return Ok(None);
        };

        match command.trim() {
            "n" => match wizard.next() {
                Ok(_) => {}
                Err(IntakeError::NoNextStep) => {
                    writeln!(output, "This is the final step; submit instead.")?
                }
                Err(e) => return Err(e.into()),
            },
            "p" => {
                wizard.previous()?;
            }
            "s" => match wizard.submit(identity, store).await {
                Ok(SubmitOutcome::Accepted { .. }) => {}
                Ok(SubmitOutcome::Blocked { failing }) => {
                    let labels: Vec<&str> = failing.iter().map(|f| f.label()).collect();
                    writeln!(output, "Cannot submit yet. Check: {}", labels.join(", "))?;
                }
                Ok(SubmitOutcome::Failed { .. }) => {}
                Err(IntakeError::NotOnFinalStep(_)) => {
                    writeln!(output, "Submit is available on the final step.")?
                }
                Err(e) => return Err(e.into()),
            },
            "q" => return Ok(None),
            other => writeln!(output, "Unknown command: {}", other)?,
        }
    }
}
