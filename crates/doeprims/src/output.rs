use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use doeprims_discovery::DiscoveryRegistry;
use doeprims_frame::{DataObjectType, DoeObject};
use doeprims_mux::{is_vendor_defined, parse_vendor_message};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One data object as shown to the operator.
#[derive(Debug, Serialize)]
pub struct ObjectOutput {
    pub vendor_id: u16,
    pub data_object_type: u8,
    pub type_name: &'static str,
    pub length_dw: u32,
    pub payload_size: usize,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_protocol: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ObjectOutput {
    pub fn from_object(object: &DoeObject) -> Self {
        let data_object_type = object.data_object_type();
        let vendor_protocol = match data_object_type {
            DataObjectType::Spdm if is_vendor_defined(&object.payload) => {
                parse_vendor_message(object.payload.clone())
                    .ok()
                    .map(|(_, message)| message.protocol().name())
            }
            _ => None,
        };
        Self {
            vendor_id: object.vendor_id(),
            data_object_type: data_object_type.as_u8(),
            type_name: data_object_type.name(),
            length_dw: object.header.length_dw,
            payload_size: object.payload.len(),
            payload: hex::encode(&object.payload),
            vendor_protocol,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Serialize)]
struct RegistryOutput<'a> {
    schema_id: &'a str,
    entries: Vec<RegistryRow>,
}

#[derive(Serialize)]
struct RegistryRow {
    index: u8,
    vendor_id: u16,
    data_object_type: u8,
    type_name: &'static str,
}

pub fn print_objects(objects: &[ObjectOutput], raw: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for object in objects {
                println!(
                    "{}",
                    serde_json::to_string(object).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["VENDOR", "TYPE", "LENGTH (DW)", "SIZE", "PAYLOAD"]);
            for object in objects {
                table.add_row(vec![
                    format!("{:#06x}", object.vendor_id),
                    type_label(object),
                    object.length_dw.to_string(),
                    object.payload_size.to_string(),
                    object
                        .error
                        .clone()
                        .unwrap_or_else(|| object.payload.clone()),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for object in objects {
                print!(
                    "vendor={:#06x} type={} length_dw={} size={} payload={}",
                    object.vendor_id,
                    type_label(object),
                    object.length_dw,
                    object.payload_size,
                    object.payload
                );
                match &object.error {
                    Some(error) => println!(" error={error}"),
                    None => println!(),
                }
            }
        }
        OutputFormat::Raw => print_raw(raw),
    }
}

pub fn print_registry(registry: &DiscoveryRegistry, format: OutputFormat) {
    let rows: Vec<RegistryRow> = registry
        .iter()
        .map(|entry| RegistryRow {
            index: entry.index,
            vendor_id: entry.vendor_id,
            data_object_type: entry.data_object_type,
            type_name: type_name(entry.vendor_id, entry.object_type()),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let out = RegistryOutput {
                schema_id: "https://schemas.3leaps.dev/doeprims/cli/v1/discovery.schema.json",
                entries: rows,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["INDEX", "VENDOR", "TYPE", "NAME"]);
            for row in rows {
                table.add_row(vec![
                    row.index.to_string(),
                    format!("{:#06x}", row.vendor_id),
                    format!("{:#04x}", row.data_object_type),
                    row.type_name.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "[{}] vendor={:#06x} type={:#04x} ({})",
                    row.index, row.vendor_id, row.data_object_type, row.type_name
                );
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                println!("{:04x}:{:02x}", row.vendor_id, row.data_object_type);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Type names are only meaningful under the PCI-SIG vendor ID.
fn type_name(vendor_id: u16, data_object_type: DataObjectType) -> &'static str {
    if vendor_id == doeprims_frame::VENDOR_ID_PCISIG {
        data_object_type.name()
    } else {
        "VENDOR"
    }
}

fn type_label(object: &ObjectOutput) -> String {
    match object.vendor_protocol {
        Some(protocol) => format!("{}/{protocol}", object.type_name),
        None => object.type_name.to_string(),
    }
}
