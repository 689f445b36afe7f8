//! Static table of the functions the assistant may call.
//!
//! The same table feeds the function-tool definitions sent to the remote
//! assistant and the startup validation of the executor, so a name the
//! assistant knows about always has a handler.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    /// `YYYY-MM-DD`
    Date,
    Integer,
}

impl FieldKind {
    fn json_schema(&self) -> Value {
        match self {
            FieldKind::Text => json!({"type": "string"}),
            FieldKind::Email => json!({"type": "string", "format": "email"}),
            FieldKind::Date => json!({"type": "string", "format": "date"}),
            FieldKind::Integer => json!({"type": "integer", "minimum": 0}),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub required_fields: &'static [ToolField],
    pub optional_fields: &'static [ToolField],
}

pub const ADD_CONTACT: ToolDeclaration = ToolDeclaration {
    name: "add_contact",
    description: "Registra los datos de contacto de una persona interesada en los servicios o el evento.",
    required_fields: &[ToolField {
        name: "name",
        kind: FieldKind::Text,
        description: "Nombre completo de la persona",
    }],
    optional_fields: &[
        ToolField {
            name: "phone",
            kind: FieldKind::Text,
            description: "Teléfono de contacto; por defecto el número de WhatsApp",
        },
        ToolField {
            name: "email",
            kind: FieldKind::Email,
            description: "Correo electrónico",
        },
        ToolField {
            name: "company",
            kind: FieldKind::Text,
            description: "Empresa u organización",
        },
        ToolField {
            name: "event_type",
            kind: FieldKind::Text,
            description: "Tipo de evento que organiza",
        },
        ToolField {
            name: "event_date",
            kind: FieldKind::Date,
            description: "Fecha estimada del evento (YYYY-MM-DD)",
        },
        ToolField {
            name: "attendees",
            kind: FieldKind::Integer,
            description: "Número estimado de asistentes",
        },
        ToolField {
            name: "plan_interest",
            kind: FieldKind::Text,
            description: "Plan o servicio de interés",
        },
        ToolField {
            name: "notes",
            kind: FieldKind::Text,
            description: "Notas adicionales de la conversación",
        },
    ],
};

pub const GET_EVENT_INFO: ToolDeclaration = ToolDeclaration {
    name: "get_event_info",
    description: "Obtiene información específica del evento por categoría.",
    required_fields: &[ToolField {
        name: "category",
        kind: FieldKind::Text,
        description: "Categoría de información a consultar",
    }],
    optional_fields: &[ToolField {
        name: "subcategory",
        kind: FieldKind::Text,
        description: "Subcategoría específica (opcional)",
    }],
};

impl ToolDeclaration {
    pub fn field(&self, name: &str) -> Option<&'static ToolField> {
        self.required_fields
            .iter()
            .chain(self.optional_fields.iter())
            .find(|field| field.name == name)
    }

    /// Function-tool definition in the shape the assistants API expects.
    pub fn to_function_tool(&self) -> Value {
        let mut properties = Map::new();
        for field in self.required_fields.iter().chain(self.optional_fields.iter()) {
            let mut schema = field.kind.json_schema();
            if let Some(object) = schema.as_object_mut() {
                object.insert("description".to_string(), json!(field.description));
            }
            properties.insert(field.name.to_string(), schema);
        }
        let required: Vec<&str> = self.required_fields.iter().map(|field| field.name).collect();
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}
