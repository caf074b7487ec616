use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use ck_marshal::config::{Config, ConfigError};
use ck_marshal::mechanism::{spec, table, FieldKind, ParamSpec};
use ck_marshal::{
    AbiProfile, Attribute, AttributeValue, MarshalError, NativeAttribute, NativeMechanism,
    Packing,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Marshaling error: {0}")]
    Marshal(#[from] MarshalError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Invalid hex input: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Unknown parameter structure: {0}")]
    UnknownStructure(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Structure packing, as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum PackingArg {
    Tight,
    Natural,
}

impl From<PackingArg> for Packing {
    fn from(arg: PackingArg) -> Self {
        match arg {
            PackingArg::Tight => Packing::Tight,
            PackingArg::Natural => Packing::Natural,
        }
    }
}

/// How to interpret the value given to `encode-attr`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ValueKind {
    Bool,
    Ulong,
    Text,
    /// Hex-encoded bytes.
    Bytes,
    /// `YYYY-MM-DD`, or empty for an unset date.
    Date,
}

#[derive(Parser)]
#[command(name = "ck-marshal")]
#[command(about = "Inspect Cryptoki structure layouts and native encodings for each ABI profile")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "CK_MARSHAL_CONFIG")]
    config: Option<PathBuf>,

    /// CK_ULONG width in bytes (overrides the configuration)
    #[arg(long, global = true, value_parser = ["4", "8"])]
    ulong_width: Option<String>,

    /// Structure packing (overrides the configuration)
    #[arg(long, global = true)]
    packing: Option<PackingArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record sizes for all four ABI profiles
    Profiles,

    /// Field offsets of mechanism parameter structures
    Layout {
        /// Structure names, with or without the CK_ prefix (all if omitted)
        structs: Vec<String>,
    },

    /// Mechanisms with a known parameter shape
    Mechanisms,

    /// Hex dump of an attribute's native value bytes
    EncodeAttr {
        /// Attribute type, decimal or 0x-prefixed hex
        #[arg(short = 't', long = "type")]
        attr_type: String,

        /// How to read VALUE
        #[arg(short, long, value_enum)]
        kind: ValueKind,

        /// The value
        value: String,
    },
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(width) = &cli.ulong_width {
        config.abi.ulong_width = Some(
            width
                .parse()
                .map_err(|_| AppError::InvalidArgument(format!("ulong width {width}")))?,
        );
    }
    if let Some(packing) = cli.packing {
        config.abi.packing = Some(packing.into());
    }
    Ok(config)
}

fn init_logging(config: &Config) -> Result<(), AppError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level)
            .map_err(|e| AppError::InvalidFilter(e.to_string()))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn parse_type(text: &str) -> Result<u64, AppError> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|_| AppError::InvalidArgument(format!("attribute type {text}")))
}

fn parse_date(text: &str) -> Result<Option<time::Date>, AppError> {
    if text.is_empty() {
        return Ok(None);
    }
    let invalid = || AppError::InvalidArgument(format!("date {text}"));
    let mut parts = text.splitn(3, '-');
    let mut next = || parts.next().ok_or_else(invalid);
    let year: i32 = next()?.parse().map_err(|_| invalid())?;
    let month: u8 = next()?.parse().map_err(|_| invalid())?;
    let day: u8 = next()?.parse().map_err(|_| invalid())?;
    let month = time::Month::try_from(month).map_err(|_| invalid())?;
    time::Date::from_calendar_date(year, month, day)
        .map(Some)
        .map_err(|_| invalid())
}

fn parse_value(kind: ValueKind, text: &str) -> Result<AttributeValue, AppError> {
    Ok(match kind {
        ValueKind::Bool => match text {
            "true" | "1" => AttributeValue::Bool(true),
            "false" | "0" => AttributeValue::Bool(false),
            _ => return Err(AppError::InvalidArgument(format!("boolean {text}"))),
        },
        ValueKind::Ulong => AttributeValue::Ulong(parse_type(text)?),
        ValueKind::Text => AttributeValue::from(text),
        ValueKind::Bytes => AttributeValue::from(hex::decode(text)?),
        ValueKind::Date => AttributeValue::Date(parse_date(text)?),
    })
}

fn print_profiles() {
    println!(
        "{:<34} {:>6} {:>8} {:>12} {:>12}",
        "profile", "ulong", "pointer", "CK_ATTRIBUTE", "CK_MECHANISM"
    );
    for profile in AbiProfile::ALL {
        println!(
            "{:<34} {:>6} {:>8} {:>12} {:>12}",
            profile.to_string(),
            profile.ulong_size(),
            profile.pointer_size(),
            NativeAttribute::size(profile),
            NativeMechanism::size(profile)
        );
    }
}

fn describe_field(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Buffer { len } => format!("bytes, length in {len}"),
        FieldKind::BufferLenPtr { len } => format!("bytes, length behind {len}"),
        FieldKind::FixedBuffer(n) => format!("pointer to {n} bytes"),
        FieldKind::Array(n) => format!("CK_BYTE[{n}]"),
        FieldKind::Inline(spec) => spec.name.to_string(),
        FieldKind::Pointer(spec) => format!("{} *", spec.name),
        FieldKind::StructArray { spec, count } => format!("{}[{count}] *", spec.name),
        other => other.describe().to_string(),
    }
}

fn print_layout(profile: AbiProfile, spec: &ParamSpec) {
    let layout = spec.layout(profile);
    let access = if spec.readable { "read/write" } else { "write-only" };
    println!("{} ({} bytes, {access})", spec.name, layout.size);
    for (field, placed) in spec.fields.iter().zip(&layout.fields) {
        println!(
            "  {:>4} {:>3}  {:<28} {}",
            placed.offset,
            placed.size,
            field.name,
            describe_field(&field.kind)
        );
    }
}

fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config)?;
    let profile = config.profile()?;
    tracing::debug!(%profile, "using ABI profile");

    match cli.command {
        Commands::Profiles => print_profiles(),

        Commands::Layout { structs } => {
            println!("# {profile}");
            if structs.is_empty() {
                for found in spec::ALL {
                    print_layout(profile, found);
                }
            } else {
                for name in &structs {
                    let found =
                        spec::find(name).ok_or_else(|| AppError::UnknownStructure(name.clone()))?;
                    print_layout(profile, found);
                }
            }
        }

        Commands::Mechanisms => {
            for info in table::entries() {
                println!(
                    "{:#010x}  {:<40} {}",
                    info.mechanism,
                    info.name,
                    info.shape.describe()
                );
            }
        }

        Commands::EncodeAttr {
            attr_type,
            kind,
            value,
        } => {
            let attr_type = parse_type(&attr_type)?;
            let value = parse_value(kind, &value)?;
            let attribute = Attribute::encode(profile, attr_type, &value)?;
            let native = attribute.as_native()?;
            println!("# {profile}");
            println!("type   {:#x}", native.attr_type);
            println!("length {}", native.value_len);
            println!("value  {}", hex::encode(attribute.bytes()?));
            println!("record {}", hex::encode(native.to_bytes(profile)?));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ck_marshal::UlongWidth;

    #[test]
    fn test_parse_type() {
        assert_eq!(parse_type("0x80000001").unwrap(), 0x8000_0001);
        assert_eq!(parse_type("3").unwrap(), 3);
        assert!(parse_type("label").is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-02-29").unwrap().unwrap();
        assert_eq!(date.year(), 2024);
        assert!(parse_date("").unwrap().is_none());
        assert!(parse_date("2023-02-29").is_err());
    }

    #[test]
    fn test_width_override() {
        let cli = Cli::parse_from(["ck-marshal", "--ulong-width", "4", "--packing", "tight", "profiles"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(
            config.profile().unwrap(),
            AbiProfile::new(UlongWidth::Four, Packing::Tight)
        );
    }
}
