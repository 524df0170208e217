//! Read-only views of a document: tree, summary, diagnostic locations.

use std::path::Path;

use anyhow::Result;
use xstudio_core::diagnostics::parse_location;
use xstudio_core::doc_info;
use xstudio_core::export::import_file;
use xstudio_core::tree::{PlaceholderKind, TreeView};

pub fn tree(path: &Path, select: Option<&str>) -> Result<()> {
    let file = import_file(path)?;
    let mut view = TreeView::default();
    view.render(&file.text);

    if let Some(placeholder) = view.placeholder() {
        match placeholder.kind {
            PlaceholderKind::Info => {
                println!("{}", placeholder.message);
                return Ok(());
            }
            PlaceholderKind::Error => match &placeholder.detail {
                Some(detail) => anyhow::bail!("{}: {detail}", placeholder.message),
                None => anyhow::bail!("{}", placeholder.message),
            },
        }
    }

    if let Some(xpath) = select
        && view.select_xpath(xpath).is_none()
    {
        anyhow::bail!("No element at {xpath}");
    }

    let Some(tree) = view.tree() else {
        return Ok(());
    };
    for row in view.visible_rows() {
        let marker = if row.selected { '*' } else { ' ' };
        let xpath = tree.node(row.id).map_or("", |n| n.xpath.as_str());
        println!(
            "{marker} {:indent$}{}    {xpath}",
            "",
            row.label,
            indent = row.depth * 2
        );
    }
    if let Some(xpath) = view.selected_xpath() {
        println!("Selected: {xpath}");
    }
    Ok(())
}

pub fn info(path: &Path) -> Result<()> {
    let file = import_file(path)?;
    let info = doc_info::extract(&file.text);
    if info.is_empty() {
        println!("No document information found.");
        return Ok(());
    }
    for (label, value) in info.rows() {
        println!("{label:<15} {value}");
    }
    Ok(())
}

pub fn locate(message: &str) {
    match parse_location(message) {
        Some(location) => println!("{location}"),
        None => println!("No location found."),
    }
}
