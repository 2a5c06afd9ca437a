use std::io::{Read, Write};

use crate::ContainerInput;
use crate::ContainerOutput;

// The host scans stdout for this exact marker pair and parses the single
// JSON line between them. Nothing else may ever be written to stdout;
// diagnostics go to stderr.
pub(crate) const OUTPUT_START_MARKER: &str = "===AGENTCELL_OUTPUT_START===";
pub(crate) const OUTPUT_END_MARKER: &str = "===AGENTCELL_OUTPUT_END===";

/// Read the startup task description: stdin to EOF, one JSON document.
pub(crate) fn read_container_input(reader: &mut impl Read) -> Result<ContainerInput, String> {
    let mut raw = String::new();
    reader
        .read_to_string(&mut raw)
        .map_err(|e| format!("reading container input: {e}"))?;
    if raw.trim().is_empty() {
        return Err("container input is empty".to_string());
    }
    serde_json::from_str(&raw).map_err(|e| format!("parsing container input: {e}"))
}

/// Write one framed output block: start marker, one line of compact JSON,
/// end marker. Exactly one block per turn.
pub(crate) fn emit_output(writer: &mut impl Write, output: &ContainerOutput) -> Result<(), String> {
    let json = serde_json::to_string(output).map_err(|e| format!("serializing output: {e}"))?;
    writeln!(writer, "{OUTPUT_START_MARKER}").map_err(|e| format!("writing output: {e}"))?;
    writeln!(writer, "{json}").map_err(|e| format!("writing output: {e}"))?;
    writeln!(writer, "{OUTPUT_END_MARKER}").map_err(|e| format!("writing output: {e}"))?;
    writer.flush().map_err(|e| format!("flushing output: {e}"))?;
    Ok(())
}

/// Frame a fatal error on stdout. Best-effort: if stdout itself is broken
/// there is nothing left to report to the host.
pub(crate) fn emit_fatal(message: String) {
    let output = ContainerOutput::error(message);
    let mut stdout = std::io::stdout();
    if let Err(e) = emit_output(&mut stdout, &output) {
        eprintln!("[protocol] failed to emit fatal output: {e}");
    }
}
