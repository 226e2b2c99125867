//! Closed sets of metric and dimension kinds.
//!
//! Catalog files refer to kinds by their snake_case identifier; an unknown
//! identifier fails when the catalog is loaded, not when a question arrives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Every metric the reporting schema can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Ggr,
    NetRevenue,
    Deposits,
    Withdrawals,
    Registrations,
    ActivePlayers,
    Wagering,
    AverageBet,
    Rtp,
    Arpu,
    RoundsPlayed,
    Bonuses,
}

/// Every dimension questions can group or filter by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionKind {
    Date,
    Week,
    Month,
    Country,
    Game,
    GameType,
    Provider,
    WhiteLabel,
    Partner,
    Device,
    PaymentMethod,
    Campaign,
    PlayerSegment,
}

impl MetricKind {
    pub const ALL: [MetricKind; 12] = [
        MetricKind::Ggr,
        MetricKind::NetRevenue,
        MetricKind::Deposits,
        MetricKind::Withdrawals,
        MetricKind::Registrations,
        MetricKind::ActivePlayers,
        MetricKind::Wagering,
        MetricKind::AverageBet,
        MetricKind::Rtp,
        MetricKind::Arpu,
        MetricKind::RoundsPlayed,
        MetricKind::Bonuses,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            MetricKind::Ggr => "ggr",
            MetricKind::NetRevenue => "net_revenue",
            MetricKind::Deposits => "deposits",
            MetricKind::Withdrawals => "withdrawals",
            MetricKind::Registrations => "registrations",
            MetricKind::ActivePlayers => "active_players",
            MetricKind::Wagering => "wagering",
            MetricKind::AverageBet => "average_bet",
            MetricKind::Rtp => "rtp",
            MetricKind::Arpu => "arpu",
            MetricKind::RoundsPlayed => "rounds_played",
            MetricKind::Bonuses => "bonuses",
        }
    }
}

impl DimensionKind {
    pub const ALL: [DimensionKind; 13] = [
        DimensionKind::Date,
        DimensionKind::Week,
        DimensionKind::Month,
        DimensionKind::Country,
        DimensionKind::Game,
        DimensionKind::GameType,
        DimensionKind::Provider,
        DimensionKind::WhiteLabel,
        DimensionKind::Partner,
        DimensionKind::Device,
        DimensionKind::PaymentMethod,
        DimensionKind::Campaign,
        DimensionKind::PlayerSegment,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            DimensionKind::Date => "date",
            DimensionKind::Week => "week",
            DimensionKind::Month => "month",
            DimensionKind::Country => "country",
            DimensionKind::Game => "game",
            DimensionKind::GameType => "game_type",
            DimensionKind::Provider => "provider",
            DimensionKind::WhiteLabel => "white_label",
            DimensionKind::Partner => "partner",
            DimensionKind::Device => "device",
            DimensionKind::PaymentMethod => "payment_method",
            DimensionKind::Campaign => "campaign",
            DimensionKind::PlayerSegment => "player_segment",
        }
    }
}

/// Error for an identifier outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {category} kind '{name}'")]
pub struct UnknownKind {
    pub category: &'static str,
    pub name: String,
}

impl FromStr for MetricKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind {
                category: "metric",
                name: s.to_string(),
            })
    }
}

impl FromStr for DimensionKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DimensionKind::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind {
                category: "dimension",
                name: s.to_string(),
            })
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
