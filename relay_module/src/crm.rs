//! Contact dashboard and form handling.

use std::collections::HashMap;

use assistant_module::tools::contacts::{ContactRecord, ContactValidationError, StoredContact};
use serde_json::{Map, Value};

/// Contacts shown on the dashboard.
pub const DASHBOARD_LIMIT: usize = 100;
/// Contacts returned by the JSON listing.
pub const API_LIMIT: usize = 1000;

const PLAN_OPTIONS: &[&str] = &["Básico", "Profesional", "Profesional B2B", "Premium"];

/// Validate a submitted form the same way the `add_contact` tool does.
pub fn record_from_form(form: &HashMap<String, String>) -> Result<ContactRecord, ContactValidationError> {
    let fields: Map<String, Value> = form
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    ContactRecord::from_fields(&fields, None)
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn cell(value: Option<&str>) -> String {
    format!("<td>{}</td>", escape_html(value.unwrap_or("")))
}

pub fn render_dashboard(contacts: &[StoredContact], error: Option<&str>) -> String {
    let mut rows = String::new();
    for contact in contacts {
        let record = &contact.record;
        rows.push_str("<tr>");
        rows.push_str(&cell(Some(&record.name)));
        rows.push_str(&cell(record.phone.as_deref()));
        rows.push_str(&cell(record.email.as_deref()));
        rows.push_str(&cell(record.company.as_deref()));
        rows.push_str(&cell(record.event_type.as_deref()));
        let event_date = record.event_date.map(|date| date.format("%Y-%m-%d").to_string());
        rows.push_str(&cell(event_date.as_deref()));
        let attendees = record.attendees.map(|count| count.to_string());
        rows.push_str(&cell(attendees.as_deref()));
        rows.push_str(&cell(record.plan_interest.as_deref()));
        rows.push_str(&cell(record.notes.as_deref()));
        let added_on = record.added_on.format("%Y-%m-%d %H:%M").to_string();
        rows.push_str(&cell(Some(&added_on)));
        rows.push_str("</tr>\n");
    }
    if contacts.is_empty() {
        rows.push_str("<tr><td colspan=\"10\">Sin contactos todavía.</td></tr>\n");
    }

    let plan_options: String = PLAN_OPTIONS
        .iter()
        .map(|plan| format!("<option value=\"{0}\">{0}</option>", escape_html(plan)))
        .collect();
    let error_banner = error
        .map(|message| format!("<p class=\"error\">{}</p>", escape_html(message)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>CRM de contactos</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; margin-top: 1.5rem; }}
th, td {{ border: 1px solid #ccc; padding: 0.4rem; text-align: left; }}
form {{ display: grid; grid-template-columns: repeat(3, 1fr); gap: 0.5rem; }}
.error {{ color: #b00020; }}
</style>
</head>
<body>
<h1>Contactos</h1>
{error_banner}
<form method="post" action="/add_contact">
<input name="name" placeholder="Nombre" required>
<input name="phone" placeholder="Teléfono">
<input name="email" type="email" placeholder="Correo">
<input name="company" placeholder="Empresa">
<input name="event_type" placeholder="Tipo de evento">
<input name="event_date" type="date">
<input name="attendees" type="number" min="0" placeholder="Asistentes">
<select name="plan_interest"><option value="">Plan de interés</option>{plan_options}</select>
<input name="notes" placeholder="Notas">
<button type="submit">Agregar contacto</button>
</form>
<table>
<thead><tr><th>Nombre</th><th>Teléfono</th><th>Correo</th><th>Empresa</th><th>Evento</th><th>Fecha</th><th>Asistentes</th><th>Plan</th><th>Notas</th><th>Agregado</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
</body>
</html>
"#
    )
}
