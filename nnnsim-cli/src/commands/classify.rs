use anyhow::{bail, Context, Result};
use log::debug;
use nnnsim_common::wire::{classify_icn, classify_nnn, from_hex};
use nnnsim_common::{IcnPacket, Pdu, WireFormat};

/// Prints the packet type carried by `hex`; with `decode`, the whole packet.
pub fn classify(hex: &str, decode: bool) -> Result<()> {
    let bytes = from_hex(hex).context("Invalid hex input")?;
    debug!("Classifying {} bytes", bytes.len());

    if let Ok(kind) = classify_nnn(&bytes) {
        println!("3N {}", kind.as_str());
        if decode {
            let pdu = Pdu::from_wire(&bytes).context("Failed to decode 3N PDU")?;
            println!("{:#?}", pdu);
        }
        return Ok(());
    }

    match classify_icn(&bytes) {
        Ok(header) => {
            println!("ICN {:?}", header);
            if decode {
                let packet = IcnPacket::from_wire(&bytes).context("Failed to decode ICN packet")?;
                println!("{:#?}", packet);
            }
            Ok(())
        }
        Err(e) => bail!("{} ({} bytes)", e, bytes.len()),
    }
}
