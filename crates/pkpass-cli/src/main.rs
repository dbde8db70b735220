//! Command-line interface for building and checking wallet passes.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pkpass::config::DEFAULT_MANDATORY_MEMBERS;
use pkpass::crypto::common_name;
use pkpass::{
    verify_archive, AssetFilter, Backend, BuildReport, PassBuilder, TrustAnchor, ValidationReport,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(name = "pkpass")]
#[command(about = "Build and verify signed wallet passes", version)]
struct Cli {
    /// Log pipeline details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a signed .pkpass from an assets directory
    Build(BuildArgs),
    /// Check the structure (and optionally the signature) of a .pkpass
    Verify(VerifyArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Directory holding pass.json and the image assets
    assets: PathBuf,

    /// Output .pkpass file
    #[arg(short, long)]
    output: PathBuf,

    /// PKCS#12 file (.p12) with the pass type identity
    #[arg(short = 'p', long)]
    pkcs12: PathBuf,

    /// Password for the PKCS#12 file
    #[arg(long, env = "PKPASS_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Intermediate CA certificate (PEM or DER)
    #[arg(short = 'a', long)]
    trust_anchor: PathBuf,

    /// Additional member the archive must contain (repeatable)
    #[arg(long = "require", value_name = "NAME")]
    require: Vec<String>,

    /// Asset extension to include (repeatable, replaces png/json)
    #[arg(long = "extension", value_name = "EXT")]
    extensions: Vec<String>,

    /// Sign in-process instead of running the openssl executable
    #[arg(long)]
    native: bool,

    /// Do not pass -legacy when reading the PKCS#12 file
    #[arg(long, conflicts_with = "native")]
    no_legacy: bool,

    /// openssl executable to run
    #[arg(long, value_name = "PATH", default_value = "openssl", conflicts_with = "native")]
    openssl: PathBuf,

    /// ZIP compression level (0-9, default: 6)
    #[arg(short = 'z', long, default_value = "6")]
    zip_level: u32,

    /// Keep the archive even if it fails validation
    #[arg(long)]
    keep_invalid: bool,

    /// Directory for the temporary staging area
    #[arg(long, value_name = "DIR")]
    staging_root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Args)]
struct VerifyArgs {
    /// .pkpass file to check
    input: PathBuf,

    /// Additional member the archive must contain (repeatable)
    #[arg(long = "require", value_name = "NAME")]
    require: Vec<String>,

    /// Also verify the signature against this CA certificate
    #[arg(short = 'a', long)]
    trust_anchor: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Build(args) => build(args),
        Command::Verify(args) => verify(args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::{fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pkpass=debug,warn")
        } else {
            EnvFilter::new("pkpass=info,warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build(args: BuildArgs) -> pkpass::Result<bool> {
    let backend = if args.native {
        Backend::Native
    } else {
        Backend::Toolchain {
            program: args.openssl,
            legacy: !args.no_legacy,
        }
    };

    let mut builder = PassBuilder::new()
        .assets_dir(&args.assets)
        .output(&args.output)
        .pkcs12(&args.pkcs12)
        .password(args.password)
        .trust_anchor(&args.trust_anchor)
        .backend(backend)
        .compression_level(args.zip_level)
        .keep_invalid_output(args.keep_invalid);

    if !args.extensions.is_empty() {
        builder = builder.asset_filter(AssetFilter::new(&args.extensions));
    }
    for name in args.require {
        builder = builder.require(name);
    }
    if let Some(root) = args.staging_root {
        builder = builder.staging_root(root);
    }

    let report = builder.build()?;
    print_build(&report, args.format)?;
    Ok(report.validation.is_flat_and_complete())
}

fn print_build(report: &BuildReport, format: Format) -> pkpass::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(report)?),
        Format::Text => {
            println!(
                "Built: {} ({} bytes)",
                report.output.display(),
                report.archive_size
            );
            for member in &report.members {
                println!("  {}", member);
            }
            if !report.validation.is_flat_and_complete() {
                println!("Missing: {:?}", report.validation.missing);
                println!("Nested: {:?}", report.validation.nested);
            }
        }
    }
    Ok(())
}

fn verify(args: VerifyArgs) -> pkpass::Result<bool> {
    let mut mandatory: Vec<String> = DEFAULT_MANDATORY_MEMBERS
        .iter()
        .map(|name| name.to_string())
        .collect();
    for name in args.require {
        if !mandatory.contains(&name) {
            mandatory.push(name);
        }
    }

    let (report, signature) = inspect(&args.input, &mandatory, args.trust_anchor.as_deref())?;
    let valid = report.is_valid();
    let signer = signature.as_ref().and_then(|result| result.as_ref().ok());

    match args.format {
        Format::Json => {
            let signature_error = signature
                .as_ref()
                .and_then(|result| result.as_ref().err())
                .map(|e| e.to_string());
            let out = json!({
                "input": args.input,
                "valid": valid,
                "validation": report,
                "signer": signer,
                "signature_error": signature_error,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Text => {
            let status = if valid { "OK" } else { "INVALID" };
            println!("{}: {}", args.input.display(), status);
            let problems = [
                ("missing", &report.missing),
                ("nested", &report.nested),
                ("digest mismatch", &report.digest_mismatches),
                ("unlisted", &report.unlisted),
            ];
            for (label, names) in problems {
                for name in names {
                    println!("  {}: {}", label, name);
                }
            }
            if let Some(reason) = &report.manifest_error {
                println!("  unreadable manifest: {}", reason);
            }
            if let Some(signer) = signer {
                println!("  signed by: {}", signer);
            }
        }
    }

    // The structural report is out before any signature failure surfaces.
    match signature {
        Some(Err(e)) => Err(e),
        _ => Ok(valid),
    }
}

/// Structural report plus, when an anchor is given, the signature outcome.
fn inspect(
    input: &Path,
    mandatory: &[String],
    trust_anchor: Option<&Path>,
) -> pkpass::Result<(ValidationReport, Option<pkpass::Result<String>>)> {
    let report = pkpass::validate_pkpass(input, mandatory)?;
    debug!(members = report.members.len(), "validated structure");

    let signature = trust_anchor.map(|path| -> pkpass::Result<String> {
        let anchor = TrustAnchor::from_file(path)?;
        let cert = verify_archive(input, &anchor)?;
        Ok(common_name(&cert).unwrap_or_default())
    });

    Ok((report, signature))
}
