//! Product catalog types.
//!
//! Products are the sellable units of the platform. Each product belongs to
//! exactly one audience space; the two spaces never cross-unlock each other.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ProductId, Timestamp};

/// Audience space a product (or subscription) belongs to.
///
/// The platform runs two independently branded catalogs. Access facts are
/// always scoped to a space; an adults subscription never unlocks kids
/// content and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudienceSpace {
    Kids,
    Adults,
}

impl AudienceSpace {
    /// Parse from the wire/storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kids" => Some(Self::Kids),
            "adults" => Some(Self::Adults),
            _ => None,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kids => "kids",
            Self::Adults => "adults",
        }
    }
}

impl std::fmt::Display for AudienceSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shape of a sellable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// One-time content pack; purchase grants perpetual access.
    Pack,
    /// Recurring subscription covering a whole audience space.
    Subscription,
    /// One-time coaching booking.
    Coaching,
    /// One-time course purchase.
    Course,
}

impl ProductKind {
    /// Parse from the wire/storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pack" => Some(Self::Pack),
            "subscription" => Some(Self::Subscription),
            "coaching" => Some(Self::Coaching),
            "course" => Some(Self::Course),
            _ => None,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pack => "pack",
            Self::Subscription => "subscription",
            Self::Coaching => "coaching",
            Self::Course => "course",
        }
    }

    /// Returns true if this kind is sold through a recurring checkout.
    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Subscription)
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A sellable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique identifier.
    pub id: ProductId,

    /// Audience space this product belongs to.
    pub space: AudienceSpace,

    /// Product shape.
    pub kind: ProductKind,

    /// Payment provider price reference (price_...).
    pub price_ref: String,

    /// Whether the product is currently sellable.
    pub active: bool,

    /// Price in minor currency units. Zero means free.
    pub unit_amount: i64,

    /// When the product was created.
    pub created_at: Timestamp,
}

impl Product {
    /// Returns true if this product has no price and is open to everyone.
    pub fn is_free(&self) -> bool {
        self.unit_amount == 0
    }
}
