use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Primitive attribute type tag, as declared by a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrType {
    Boolean,
    Integer,
    Number,
    Date,
    DateTime,
    Float,
    String,
    /// Any tag without a dedicated mapping
    Other(String),
}

impl AttrType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "boolean" => Self::Boolean,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "float" => Self::Float,
            "string" => Self::String,
            other => Self::Other(other.to_string()),
        }
    }

    /// Column affinity used when creating the table
    pub fn column_type(&self) -> ColumnType {
        match self {
            Self::Boolean | Self::Integer => ColumnType::Integer,
            Self::Number | Self::Date | Self::DateTime => ColumnType::Numeric,
            Self::Float => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }
}

/// SQL column types produced by the migrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Numeric,
    Real,
    Text,
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::Numeric => write!(f, "NUMERIC"),
            ColumnType::Real => write!(f, "REAL"),
            ColumnType::Text => write!(f, "TEXT"),
        }
    }
}

/// Named, typed attribute (also used for the primary key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub datatype: AttrType,
}

impl Attribute {
    pub fn new(name: &str, tag: &str) -> Self {
        Self {
            name: name.to_string(),
            datatype: AttrType::parse(tag),
        }
    }
}

/// Entity type definition; maps to exactly one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    pub primary_key: Attribute,
    /// Attribute columns, in table order
    pub attributes: Vec<Attribute>,
}

impl EntityType {
    /// Creates a type keyed by a string `id`
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            primary_key: Attribute::new("id", "string"),
            attributes: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, name: &str, tag: &str) -> Self {
        self.primary_key = Attribute::new(name, tag);
        self
    }

    pub fn with_attribute(mut self, name: &str, tag: &str) -> Self {
        self.attributes.push(Attribute::new(name, tag));
        self
    }

    /// Validates the definition before a table is built from it
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Internal("model has no name".into()));
        }
        if self.primary_key.name.is_empty() {
            return Err(Error::Internal(format!(
                "No primary key for model {}",
                self.name
            )));
        }

        for (i, attr) in self.attributes.iter().enumerate() {
            if attr.name == self.primary_key.name {
                return Err(Error::Internal(format!(
                    "attribute {} of model {} shadows the primary key",
                    attr.name, self.name
                )));
            }
            if self.attributes[..i].iter().any(|a| a.name == attr.name) {
                return Err(Error::Internal(format!(
                    "duplicate attribute {} in model {}",
                    attr.name, self.name
                )));
            }
        }
        Ok(())
    }

    /// Column names in table order, primary key first
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(self.primary_key.name.as_str())
            .chain(self.attributes.iter().map(|a| a.name.as_str()))
            .collect()
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// Registry of all models known to a source
#[derive(Debug, Default)]
pub struct Schema {
    models: Vec<EntityType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or redefines) a model
    pub fn register(&mut self, model: EntityType) -> Result<&EntityType> {
        model.validate()?;
        let pos = match self.models.iter().position(|m| m.name == model.name) {
            Some(pos) => {
                self.models[pos] = model;
                pos
            }
            None => {
                self.models.push(model);
                self.models.len() - 1
            }
        };
        Ok(&self.models[pos])
    }

    pub fn get(&self, name: &str) -> Option<&EntityType> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Returns the model, error if it was never registered
    pub fn must_get(&self, name: &str) -> Result<&EntityType> {
        self.get(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn models(&self) -> &[EntityType] {
        &self.models
    }
}
