//! Container listing

use anyhow::{Context, Result};
use cso2_pkg::{EntryFlags, PkgEntry};
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::{Cell, Row, Table};

use crate::cli::ListArgs;
use crate::commands::open_container;
use crate::utils::{
    create_spinner, format_bytes, format_compression_ratio, format_flag, matches_pattern,
    truncate_path,
};

pub fn execute(args: ListArgs) -> Result<()> {
    let spinner = create_spinner("Opening container...");
    let container = open_container(&args.container, args.provider);
    spinner.finish_and_clear();
    let container = container?;

    log::info!(
        "{}: {} entries, provider {}, directory {}",
        container.name(),
        container.entries().len(),
        container.provider(),
        container.directory()
    );

    let pattern = args.filter.as_deref().unwrap_or("*");
    let entries: Vec<_> = container
        .entries()
        .iter()
        .filter(|e| matches_pattern(e.path(), pattern))
        .collect();

    if entries.is_empty() {
        println!("No entries found matching pattern: {pattern}");
        return Ok(());
    }

    if !args.long && !args.detect {
        for entry in entries {
            println!("{}", entry.path());
        }
        return Ok(());
    }

    let columns = Column::select(args.long, args.detect);
    let mut table = entry_table(&columns);

    for entry in entries {
        let flags = if args.detect {
            entry
                .detect_flags(&container)
                .with_context(|| format!("Failed to read {}", entry.path()))?
        } else {
            EntryFlags::default()
        };
        let cells = columns
            .iter()
            .map(|&column| Cell::new(&column.value(entry, flags)).style_spec(column.style(false)))
            .collect();
        table.add_row(Row::new(cells));
    }

    table.printstd();
    Ok(())
}

/// One column of the `--long`/`--detect` listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Path,
    Size,
    Stored,
    Ratio,
    Offset,
    Encrypted,
    AppEncrypted,
    CompressedTexture,
}

impl Column {
    fn select(long: bool, detect: bool) -> Vec<Column> {
        let mut columns = vec![Column::Path, Column::Size];
        if long {
            columns.extend([
                Column::Stored,
                Column::Ratio,
                Column::Offset,
                Column::Encrypted,
            ]);
        }
        if detect {
            columns.extend([Column::AppEncrypted, Column::CompressedTexture]);
        }
        columns
    }

    fn title(self) -> &'static str {
        match self {
            Column::Path => "Path",
            Column::Size => "Size",
            Column::Stored => "Stored",
            Column::Ratio => "Ratio",
            Column::Offset => "Offset",
            Column::Encrypted => "Encrypted",
            Column::AppEncrypted => "App-encrypted",
            Column::CompressedTexture => "Compressed texture",
        }
    }

    /// Sizes and offsets line up on the right
    fn is_numeric(self) -> bool {
        matches!(
            self,
            Column::Size | Column::Stored | Column::Ratio | Column::Offset
        )
    }

    /// prettytable style spec for a title or body cell
    fn style(self, title: bool) -> &'static str {
        match (title, self.is_numeric()) {
            (true, true) => "br",
            (true, false) => "b",
            (false, true) => "r",
            (false, false) => "",
        }
    }

    fn value(self, entry: &PkgEntry, flags: EntryFlags) -> String {
        let unpacked = u64::from(entry.unpacked_size());
        let packed = u64::from(entry.packed_size());
        match self {
            Column::Path => truncate_path(entry.path(), 60),
            Column::Size => format_bytes(unpacked),
            Column::Stored => format_bytes(packed),
            Column::Ratio => format_compression_ratio(unpacked, packed),
            Column::Offset => format!("0x{:08X}", entry.offset()),
            Column::Encrypted => format_flag(entry.is_encrypted()).to_string(),
            Column::AppEncrypted => format_flag(flags.encrypted_file).to_string(),
            Column::CompressedTexture => format_flag(flags.compressed_texture).to_string(),
        }
    }
}

/// Borderless table with an underlined title row
fn entry_table(columns: &[Column]) -> Table {
    let format = FormatBuilder::new()
        .column_separator(' ')
        .padding(0, 2)
        .separator(LinePosition::Title, LineSeparator::new('-', ' ', ' ', ' '))
        .build();

    let mut table = Table::new();
    table.set_format(format);
    table.set_titles(Row::new(
        columns
            .iter()
            .map(|column| Cell::new(column.title()).style_spec(column.style(true)))
            .collect(),
    ));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_listing_columns() {
        assert_eq!(
            Column::select(false, true),
            [
                Column::Path,
                Column::Size,
                Column::AppEncrypted,
                Column::CompressedTexture
            ]
        );
    }

    #[test]
    fn test_long_listing_columns() {
        let columns = Column::select(true, false);
        let titles: Vec<_> = columns.iter().map(|c| c.title()).collect();
        assert_eq!(
            titles,
            ["Path", "Size", "Stored", "Ratio", "Offset", "Encrypted"]
        );
        assert!(!Column::Path.is_numeric());
        assert!(Column::Offset.is_numeric());
    }

    #[test]
    fn test_table_titles_only() {
        let table = entry_table(&Column::select(true, true));
        assert_eq!(table.len(), 0);
        let rendered = table.to_string();
        assert!(rendered.contains("Compressed texture"), "{rendered}");
        assert!(rendered.contains("---"), "{rendered}");
    }
}
