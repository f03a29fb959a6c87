use serde::Deserialize;

/// Research window: a preset day count or a custom date range.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawPeriod")]
pub enum Period {
    Preset { days: u32 },
    Custom {
        start: Option<String>,
        end: Option<String>,
    },
}

/// Wire shape. Accepts `{preset_days}` / `{start_date, end_date}` as well as
/// the browser's `{type: "days", days}` / `{type: "custom", start, end}`.
#[derive(Debug, Default, Deserialize)]
struct RawPeriod {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(alias = "preset_days", default)]
    days: Option<u32>,
    #[serde(alias = "start_date", default)]
    start: Option<String>,
    #[serde(alias = "end_date", default)]
    end: Option<String>,
}

impl From<RawPeriod> for Period {
    fn from(raw: RawPeriod) -> Self {
        let custom = raw.kind.as_deref() == Some("custom")
            || raw.start.is_some()
            || raw.end.is_some();
        if custom {
            Period::Custom {
                start: raw.start,
                end: raw.end,
            }
        } else {
            Period::Preset {
                days: raw.days.unwrap_or(7),
            }
        }
    }
}

/// Display label plus the directive fragment describing the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodQuery {
    pub label: String,
    pub note: String,
}

/// Never fails: missing custom endpoints render as empty strings.
pub fn normalize(period: Option<&Period>) -> PeriodQuery {
    let Some(period) = period else {
        return PeriodQuery {
            label: "直近7日".to_string(),
            note: String::new(),
        };
    };

    match period {
        Period::Custom { start, end } => {
            let start = start.as_deref().unwrap_or("");
            let end = end.as_deref().unwrap_or("");
            PeriodQuery {
                label: format!("カスタム: {}〜{}", start, end),
                note: format!("期間は {}〜{}。", start, end),
            }
        }
        Period::Preset { days } => {
            let label = match *days {
                7 => "直近7日".to_string(),
                30 => "直近1ヶ月".to_string(),
                90 => "直近3ヶ月".to_string(),
                n => format!("直近{}日", n),
            };
            PeriodQuery {
                label,
                note: format!("過去{}日を中心に", days),
            }
        }
    }
}
