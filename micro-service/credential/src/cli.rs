//! Operator commands for the credential service.
//!
//! Secrets are read from stdin, never from arguments, so they stay out of
//! shell history and process listings.

use app_authentication::{
    PasswordAlgorithm, StoredHash, TokenAuthenticator, TokenStatus, hasher_from_config,
    verify_password,
};
use app_config::AppConfig;
use app_error::{AppError, AppErrorExt, AppResult, input_error};
use chrono::Duration;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

/// Credential service - password hashing and token issuance
#[derive(Parser, Debug)]
#[command(name = "micro-credential")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file (takes precedence over APP_CONFIG_PATH)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Hash a secret read from stdin
    Hash(HashArgs),

    /// Check a secret read from stdin against a stored hash
    Verify(VerifyArgs),

    /// Issue a token for a subject
    Issue(IssueArgs),

    /// Validate a token given as an argument or on stdin
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HashArgs {
    /// Work factor (overrides configuration)
    #[arg(long)]
    pub cost: Option<u32>,

    /// Hashing scheme: bcrypt or argon2id (overrides configuration)
    #[arg(long)]
    pub algorithm: Option<PasswordAlgorithm>,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Stored hash to check against
    #[arg(long)]
    pub hash: String,
}

#[derive(Args, Debug, Clone)]
pub struct IssueArgs {
    /// Subject the token is issued for
    #[arg(long)]
    pub subject: String,

    /// Lifetime in seconds (defaults to the configured ttl)
    #[arg(long, allow_negative_numbers = true)]
    pub ttl: Option<i64>,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Token to validate; read from stdin when omitted
    #[arg(long)]
    pub token: Option<String>,
}

/// How a command finished, short of an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Rejected,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Rejected => 1,
        }
    }
}

/// Exit code for a command that failed with an error
pub const ERROR_EXIT_CODE: u8 = 2;

#[derive(Debug, Serialize)]
struct ValidationReport<'a> {
    subject: Option<&'a str>,
    status: TokenStatus,
    valid: bool,
}

pub fn run<R, W>(command: &Command, config: &AppConfig, input: &mut R, output: &mut W) -> AppResult<Outcome>
where
    R: BufRead,
    W: Write,
{
    match command {
        Command::Hash(args) => hash(args, config, input, output),
        Command::Verify(args) => verify(args, config, input, output),
        Command::Issue(args) => issue(args, config, output),
        Command::Validate(args) => validate(args, config, input, output),
    }
}

fn hash<R: BufRead, W: Write>(
    args: &HashArgs,
    config: &AppConfig,
    input: &mut R,
    output: &mut W,
) -> AppResult<Outcome> {
    config.validate_password()?;

    let mut password = config.security.password.clone();
    if let Some(algorithm) = args.algorithm {
        password.algorithm = algorithm;
    }
    if let Some(cost) = args.cost {
        password.cost = cost;
    }

    let secret = read_secret(input)?;
    let stored = hasher_from_config(&password).hash(secret.as_bytes(), password.cost)?;
    debug!(?stored, "Hash created");

    writeln!(output, "{}", stored).server_err()?;
    Ok(Outcome::Success)
}

fn verify<R: BufRead, W: Write>(
    args: &VerifyArgs,
    config: &AppConfig,
    input: &mut R,
    output: &mut W,
) -> AppResult<Outcome> {
    config.validate_password()?;

    let secret = read_secret(input)?;
    let stored = StoredHash::new(args.hash.trim());

    if verify_password(secret.as_bytes(), &stored)? {
        writeln!(output, "match").server_err()?;
        Ok(Outcome::Success)
    } else {
        writeln!(output, "mismatch").server_err()?;
        Ok(Outcome::Rejected)
    }
}

fn issue<W: Write>(args: &IssueArgs, config: &AppConfig, output: &mut W) -> AppResult<Outcome> {
    config.validate()?;

    let authenticator = TokenAuthenticator::from_config(&config.security.jwt)?;
    let ttl = match args.ttl {
        Some(seconds) => Duration::try_seconds(seconds)
            .ok_or_else(|| AppError::invalid_input("ttl", "is out of range"))?,
        None => authenticator.default_ttl(),
    };

    let token = authenticator.issue(&args.subject, ttl)?;

    writeln!(output, "{}", token).server_err()?;
    Ok(Outcome::Success)
}

fn validate<R: BufRead, W: Write>(
    args: &ValidateArgs,
    config: &AppConfig,
    input: &mut R,
    output: &mut W,
) -> AppResult<Outcome> {
    config.validate()?;
    let authenticator = TokenAuthenticator::from_config(&config.security.jwt)?;

    let token = match &args.token {
        Some(token) => token.trim().to_string(),
        None => read_line(input)?.trim().to_string(),
    };

    let validation = authenticator.validate(&token)?;
    let report = ValidationReport {
        subject: validation.subject.as_deref(),
        status: validation.status,
        valid: validation.is_valid(),
    };

    writeln!(output, "{}", serde_json::to_string(&report).server_err()?).server_err()?;

    if report.valid {
        Ok(Outcome::Success)
    } else {
        Ok(Outcome::Rejected)
    }
}

fn read_line<R: BufRead>(input: &mut R) -> AppResult<String> {
    let mut line = String::new();
    input.read_line(&mut line).server_err()?;
    Ok(line)
}

/// One line of stdin without its line ending; other whitespace is part of the secret
fn read_secret<R: BufRead>(input: &mut R) -> AppResult<String> {
    let line = read_line(input)?;
    let secret = line.trim_end_matches(['\r', '\n']);
    if secret.is_empty() {
        return input_error!("secret", "no secret was provided on stdin");
    }
    Ok(secret.to_string())
}
