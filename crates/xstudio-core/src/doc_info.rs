//! Document info panel: a best-effort semantic summary of the XML buffer.
//!
//! This is not validation. Fields are looked up by qualified name first
//! (`cbc:ID`) and then by local name in any namespace, first match in document
//! order. Anything missing stays `None` and displays as [`ABSENT`].

use std::sync::OnceLock;

use regex::Regex;
use roxmltree::{Document, Node};

/// Display value for a missing field.
pub const ABSENT: &str = "—";

const UBL_NS_PREFIX: &str = "urn:oasis:names:specification:ubl:schema:xsd:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Party {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub root_name: Option<String>,
    pub invoice_id: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub customization_id: Option<String>,
    pub profile_id: Option<String>,
    pub seller: Party,
    pub buyer: Party,
    pub currency_code: Option<String>,
    pub payable_amount: Option<String>,
    pub doc_type: Option<String>,
}

impl DocumentInfo {
    /// True when nothing at all could be extracted.
    pub fn is_empty(&self) -> bool {
        let fields = [
            &self.root_name,
            &self.invoice_id,
            &self.issue_date,
            &self.due_date,
            &self.customization_id,
            &self.profile_id,
            &self.seller.name,
            &self.seller.id,
            &self.buyer.name,
            &self.buyer.id,
            &self.currency_code,
            &self.payable_amount,
        ];
        fields.iter().all(|f| f.is_none())
            && self.doc_type.as_deref().is_none_or(|t| t == "Unknown")
    }

    /// Label/value pairs in panel order, with missing values shown as `—`.
    pub fn rows(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Root", display(self.root_name.as_deref())),
            ("Type", display(self.doc_type.as_deref())),
            ("Invoice ID", display(self.invoice_id.as_deref())),
            ("Issue date", display(self.issue_date.as_deref())),
            ("Due date", display(self.due_date.as_deref())),
            ("Customization", display(self.customization_id.as_deref())),
            ("Profile", display(self.profile_id.as_deref())),
            ("Seller", display(self.seller.name.as_deref())),
            ("Seller ID", display(self.seller.id.as_deref())),
            ("Buyer", display(self.buyer.name.as_deref())),
            ("Buyer ID", display(self.buyer.id.as_deref())),
            ("Currency", display(self.currency_code.as_deref())),
            ("Payable amount", display(self.payable_amount.as_deref())),
        ]
    }
}

pub fn display(value: Option<&str>) -> &str {
    value.unwrap_or(ABSENT)
}

/// Extracts the document summary from XML text. Never fails.
pub fn extract(xml: &str) -> DocumentInfo {
    if xml.trim().is_empty() {
        return DocumentInfo::default();
    }
    match Document::parse(xml) {
        Ok(doc) => extract_from_document(&doc),
        Err(err) => {
            tracing::debug!(error = %err, "doc info falling back to tag scan");
            extract_tolerant(xml)
        }
    }
}

fn extract_from_document(doc: &Document<'_>) -> DocumentInfo {
    let root = doc.root_element();
    let root_name = root.tag_name().name().to_string();

    let customization_id = text_of(root, "cbc:CustomizationID", "CustomizationID");
    let profile_id = text_of(root, "cbc:ProfileID", "ProfileID");

    let currency_code = text_of(root, "cbc:DocumentCurrencyCode", "DocumentCurrencyCode")
        .or_else(|| {
            find_first(root, "cbc:PayableAmount", "PayableAmount")
                .and_then(|n| n.attribute("currencyID"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });

    let mut doc_type = classify(
        &root_name,
        customization_id.as_deref(),
        profile_id.as_deref(),
    );
    if root
        .tag_name()
        .namespace()
        .is_some_and(|ns| ns.starts_with(UBL_NS_PREFIX))
        && doc_type != "Unknown"
    {
        doc_type = format!("UBL {doc_type}");
    }

    DocumentInfo {
        invoice_id: text_of(root, "cbc:ID", "ID"),
        issue_date: text_of(root, "cbc:IssueDate", "IssueDate"),
        due_date: text_of(root, "cbc:DueDate", "DueDate"),
        seller: party(root, "cac:AccountingSupplierParty", "AccountingSupplierParty"),
        buyer: party(root, "cac:AccountingCustomerParty", "AccountingCustomerParty"),
        payable_amount: text_of(root, "cbc:PayableAmount", "PayableAmount"),
        root_name: Some(root_name),
        doc_type: Some(doc_type),
        customization_id,
        profile_id,
        currency_code,
    }
}

fn party(root: Node<'_, '_>, qualified: &str, local: &str) -> Party {
    let Some(scope) = find_first(root, qualified, local) else {
        return Party::default();
    };
    let name = find_first(scope, "cac:PartyName", "PartyName")
        .and_then(|n| text_of(n, "cbc:Name", "Name"))
        .or_else(|| text_of(scope, "cbc:RegistrationName", "RegistrationName"));
    let id = text_of(scope, "cbc:EndpointID", "EndpointID")
        .or_else(|| {
            find_first(scope, "cac:PartyIdentification", "PartyIdentification")
                .and_then(|n| text_of(n, "cbc:ID", "ID"))
        })
        .or_else(|| text_of(scope, "cbc:CompanyID", "CompanyID"));
    Party { name, id }
}

fn text_of(scope: Node<'_, '_>, qualified: &str, local: &str) -> Option<String> {
    find_first(scope, qualified, local).and_then(node_text)
}

/// Qualified-name match first, then a local-name match in any namespace.
fn find_first<'a, 'input>(
    scope: Node<'a, 'input>,
    qualified: &str,
    local: &str,
) -> Option<Node<'a, 'input>> {
    let elements = || scope.descendants().skip(1).filter(Node::is_element);
    elements()
        .find(|n| qualified_name(*n) == qualified)
        .or_else(|| elements().find(|n| n.tag_name().name().eq_ignore_ascii_case(local)))
}

/// Tag name as written in the source, prefix included.
pub(crate) fn qualified_name(node: Node<'_, '_>) -> String {
    let local = node.tag_name().name();
    match node
        .tag_name()
        .namespace()
        .and_then(|ns| node.lookup_prefix(ns))
    {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

fn node_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Human label for the document type.
pub fn classify(root_local: &str, customization: Option<&str>, profile: Option<&str>) -> String {
    let lower = root_local.to_ascii_lowercase();
    let base = if lower.contains("creditnote") || lower.contains("credit-note") {
        "Credit Note"
    } else if lower.contains("invoice") {
        "Invoice"
    } else if lower.contains("order") {
        "Order"
    } else {
        "Unknown"
    };

    let ids = format!(
        "{} {}",
        customization.unwrap_or_default(),
        profile.unwrap_or_default()
    )
    .to_ascii_lowercase();
    if ids.contains("peppol.eu") || ids.contains("poacc:billing:3.0") {
        format!("{base} (PEPPOL BIS Billing 3)")
    } else if ids.contains("en16931") {
        format!("{base} (EN16931)")
    } else {
        base.to_string()
    }
}

fn root_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<\s*(?:[A-Za-z_][\w.\-]*:)?([A-Za-z_][\w.\-]*)[^>]*>")
            .expect("valid root element regex")
    })
}

/// Fields the tolerant scan looks for, each with a lazily compiled pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanField {
    Id,
    IssueDate,
    DueDate,
    CustomizationId,
    ProfileId,
}

impl ScanField {
    const COUNT: usize = 5;

    fn local_name(self) -> &'static str {
        match self {
            ScanField::Id => "ID",
            ScanField::IssueDate => "IssueDate",
            ScanField::DueDate => "DueDate",
            ScanField::CustomizationId => "CustomizationID",
            ScanField::ProfileId => "ProfileID",
        }
    }

    fn regex(self) -> &'static Regex {
        static RES: [OnceLock<Regex>; ScanField::COUNT] =
            [const { OnceLock::new() }; ScanField::COUNT];
        RES[self as usize].get_or_init(|| {
            let pattern = format!(
                r"(?i)<\s*(?:[A-Za-z_][\w.\-]*:)?{}(?:\s[^>]*)?>([^<]+)<",
                regex::escape(self.local_name())
            );
            Regex::new(&pattern).expect("valid field regex")
        })
    }
}

fn tag_text(xml: &str, field: ScanField) -> Option<String> {
    field
        .regex()
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Scan used when the XML does not parse (e.g. undeclared prefixes or
/// half-typed markup).
fn extract_tolerant(xml: &str) -> DocumentInfo {
    let root_name = root_regex()
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let customization_id = tag_text(xml, ScanField::CustomizationId);
    let profile_id = tag_text(xml, ScanField::ProfileId);
    let doc_type = root_name
        .as_deref()
        .map(|root| classify(root, customization_id.as_deref(), profile_id.as_deref()));

    DocumentInfo {
        invoice_id: tag_text(xml, ScanField::Id),
        issue_date: tag_text(xml, ScanField::IssueDate),
        due_date: tag_text(xml, ScanField::DueDate),
        root_name,
        doc_type,
        customization_id,
        profile_id,
        ..DocumentInfo::default()
    }
}
