use crate::NodeError;
use node_config::PortMap;
use remapper::apply_port_map_to_bytes;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Reads a proxy config from `input` (stdin when `None`), applies the port
/// map and writes the result to `output` (stdout when `None`).
pub fn run(
    port_map: &PortMap,
    input: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), NodeError> {
    let written = match (input, output) {
        (Some(input), Some(output)) => remap(
            port_map,
            BufReader::new(File::open(input)?),
            BufWriter::new(File::create(output)?),
        )?,
        (Some(input), None) => remap(
            port_map,
            BufReader::new(File::open(input)?),
            io::stdout().lock(),
        )?,
        (None, Some(output)) => remap(
            port_map,
            io::stdin().lock(),
            BufWriter::new(File::create(output)?),
        )?,
        (None, None) => remap(port_map, io::stdin().lock(), io::stdout().lock())?,
    };

    tracing::debug!(bytes = written, "Proxy config written");
    Ok(())
}

/// Remaps the config read from `reader` into `writer`, returning the number
/// of bytes written. Nothing is written if the input cannot be parsed.
pub fn remap<R: Read, W: Write>(
    port_map: &PortMap,
    mut reader: R,
    mut writer: W,
) -> Result<usize, NodeError> {
    let mut config_bytes = Vec::new();
    reader.read_to_end(&mut config_bytes)?;

    let remapped = apply_port_map_to_bytes(&config_bytes, port_map)?;

    writer.write_all(&remapped)?;
    writer.flush()?;
    Ok(remapped.len())
}
