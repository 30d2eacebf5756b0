use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DeviceConfig;

/// Fixed report name, overwritten on every run.
pub const REPORT_FILE_NAME: &str = "backup_report.txt";

/// Plain-text run report: successful device names first, then the failures
/// (section omitted when there are none). Order follows the inventory.
pub fn write_text_report(
    directory: &Path,
    successful: &[String],
    failed: &[String],
) -> Result<PathBuf> {
    let mut report = String::from("Successfully executed hosts:\n");
    for device in successful {
        report.push_str(device);
        report.push('\n');
    }
    if !failed.is_empty() {
        report.push_str("\nHosts with errors:\n");
        for device in failed {
            report.push_str(device);
            report.push('\n');
        }
    }

    let path = directory.join(REPORT_FILE_NAME);
    fs::write(&path, report).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// HTML summary with one row per vendor group in the command configuration,
/// counting the successful devices whose inventory group matches. Groups with
/// no successes still get a row.
pub fn render_html_summary(
    commands: &BTreeMap<String, Vec<String>>,
    devices: &[DeviceConfig],
    successful: &[String],
) -> String {
    let mut table_rows = String::new();
    for group in commands.keys() {
        let success_count = successful
            .iter()
            .filter(|name| {
                devices
                    .iter()
                    .any(|device| device.name == **name && device.group == *group)
            })
            .count();
        table_rows.push_str(&format!(
            r#"            <tr>
                <td style="text-align: center;">{group}</td>
                <td style="text-align: center;">{success_count}</td>
            </tr>
"#
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
table {{
    font-family: Arial, sans-serif;
    border-collapse: collapse;
    width: 100%;
}}
td, th {{
    border: 1px solid #dddddd;
    text-align: left;
    padding: 8px;
}}
th {{
    background-color: #f2f2f2;
}}
</style>
</head>
<body>
<table border="1" cellpadding="5" cellspacing="0" style="border-collapse: collapse; width: 100%;">
    <thead>
        <tr>
            <th style="text-align: center;">Device</th>
            <th style="text-align: center;">Executed</th>
        </tr>
    </thead>
    <tbody>
{table_rows}    </tbody>
</table>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, group: &str) -> DeviceConfig {
        DeviceConfig {
            address: "10.0.0.1".to_string(),
            name: name.to_string(),
            group: group.to_string(),
            city: "X".to_string(),
        }
    }

    #[test]
    fn text_report_lists_each_device_once_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let successful = vec!["OLT-B".to_string(), "OLT-A".to_string()];
        let failed = vec!["OLT-C".to_string()];

        let path = write_text_report(dir.path(), &successful, &failed).unwrap();
        assert_eq!(path.file_name().unwrap(), REPORT_FILE_NAME);

        let report = fs::read_to_string(path).unwrap();
        assert_eq!(
            report,
            "Successfully executed hosts:\nOLT-B\nOLT-A\n\nHosts with errors:\nOLT-C\n"
        );
    }

    #[test]
    fn text_report_omits_error_section_when_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let successful = vec!["OLT-A".to_string()];

        let path = write_text_report(dir.path(), &successful, &[]).unwrap();
        let report = fs::read_to_string(path).unwrap();
        assert_eq!(report, "Successfully executed hosts:\nOLT-A\n");
    }

    #[test]
    fn text_report_is_overwritten_each_run() {
        let dir = tempfile::tempdir().unwrap();
        write_text_report(dir.path(), &["OLT-A".to_string()], &[]).unwrap();
        let path = write_text_report(dir.path(), &["OLT-B".to_string()], &[]).unwrap();

        let report = fs::read_to_string(path).unwrap();
        assert!(!report.contains("OLT-A"));
        assert!(report.contains("OLT-B"));
    }

    #[test]
    fn html_summary_counts_per_group_including_zero() {
        let commands = BTreeMap::from([
            ("Huawei".to_string(), vec!["display current-configuration".to_string()]),
            ("Zte".to_string(), vec!["show running-config".to_string()]),
        ]);
        let devices = vec![
            device("OLT-A", "Zte"),
            device("OLT-B", "Zte"),
            device("OLT-C", "Huawei"),
        ];
        let successful = vec!["OLT-A".to_string(), "OLT-B".to_string()];

        let html = render_html_summary(&commands, &devices, &successful);

        let zte_row = html.find(">Zte<").unwrap();
        assert!(html[zte_row..].contains(">2<"));
        let huawei_row = html.find(">Huawei<").unwrap();
        assert!(html[huawei_row..huawei_row + 200].contains(">0<"));
    }

    #[test]
    fn html_summary_ignores_successes_outside_inventory() {
        let commands = BTreeMap::from([("Zte".to_string(), vec!["show running-config".to_string()])]);
        let devices = vec![device("OLT-A", "Zte")];
        let successful = vec!["OLT-UNKNOWN".to_string()];

        let html = render_html_summary(&commands, &devices, &successful);
        let zte_row = html.find(">Zte<").unwrap();
        assert!(html[zte_row..].contains(">0<"));
    }
}
