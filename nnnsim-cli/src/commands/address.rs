use crate::AddressCommands;
use anyhow::{Context, Result};
use nnnsim_common::NnnAddress;

fn parse(text: &str) -> Result<NnnAddress> {
    NnnAddress::parse(text).with_context(|| format!("Invalid 3N address '{}'", text))
}

pub fn handle_command(cmd: AddressCommands) -> Result<()> {
    match cmd {
        AddressCommands::Distance { a, b } => {
            let (a, b) = (parse(&a)?, parse(&b)?);
            println!("{}", a.distance(&b));
        }
        AddressCommands::Closest { a, b } => {
            let (a, b) = (parse(&a)?, parse(&b)?);
            println!("{}", a.closest_sector(&b));
        }
        AddressCommands::Sector { address } => {
            println!("{}", parse(&address)?.sector_name());
        }
    }
    Ok(())
}
