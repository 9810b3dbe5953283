use anyhow::{Context, Result};

use super::{ConfigCommand, SetGstArgs};
use crate::config::{parse_rate, PricingConfig};
use crate::db::{Database, SCHEMA_VERSION};

/// Execute a config subcommand
pub fn run_config(db: &Database, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = PricingConfig::load(db)?;
            println!("SGST rate       {}", config.sgst_rate);
            println!("CGST rate       {}", config.cgst_rate);
            println!("Schema version  {}", SCHEMA_VERSION);
        }
        ConfigCommand::SetGst(args) => {
            let config = set_gst(db, &args)?;
            println!("Saved SGST {} and CGST {}", config.sgst_rate, config.cgst_rate);
        }
        ConfigCommand::ResetGst => {
            if PricingConfig::reset(db)? {
                log::info!("stored GST rates removed");
                println!("Stored GST rates removed; defaults apply.");
            } else {
                println!("No stored GST rates.");
            }
        }
    }
    Ok(())
}

pub fn set_gst(db: &Database, args: &SetGstArgs) -> Result<PricingConfig> {
    let config = PricingConfig {
        sgst_rate: parse_rate(&args.sgst).with_context(|| format!("invalid SGST rate {:?}", args.sgst))?,
        cgst_rate: parse_rate(&args.cgst).with_context(|| format!("invalid CGST rate {:?}", args.cgst))?,
    };
    config.save(db)?;
    log::info!("GST rates set to {} / {}", config.sgst_rate, config.cgst_rate);
    Ok(config)
}
