use crate::parameter::Pollutant;
use serde::Serialize;

/// Health categories, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
    Unknown,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Good => "Good",
            Category::Moderate => "Moderate",
            Category::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Category::Unhealthy => "Unhealthy",
            Category::VeryUnhealthy => "Very Unhealthy",
            Category::Hazardous => "Hazardous",
            Category::Unknown => "Unknown",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Good => "#00e400",
            Category::Moderate => "#ffff00",
            Category::UnhealthyForSensitiveGroups => "#ff7e00",
            Category::Unhealthy => "#ff0000",
            Category::VeryUnhealthy => "#99004c",
            Category::Hazardous => "#7e0023",
            Category::Unknown => "#808080",
        }
    }
}

/// Inclusive upper bound of a category tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub upper: f64,
    pub category: Category,
}

const fn tiers(bounds: [f64; 5]) -> [Breakpoint; 6] {
    [
        Breakpoint {
            upper: bounds[0],
            category: Category::Good,
        },
        Breakpoint {
            upper: bounds[1],
            category: Category::Moderate,
        },
        Breakpoint {
            upper: bounds[2],
            category: Category::UnhealthyForSensitiveGroups,
        },
        Breakpoint {
            upper: bounds[3],
            category: Category::Unhealthy,
        },
        Breakpoint {
            upper: bounds[4],
            category: Category::VeryUnhealthy,
        },
        Breakpoint {
            upper: f64::INFINITY,
            category: Category::Hazardous,
        },
    ]
}

static O3: [Breakpoint; 6] = tiers([70.0, 95.0, 154.0, 204.0, 404.0]);
static PM10: [Breakpoint; 6] = tiers([54.0, 154.0, 254.0, 354.0, 424.0]);
static PM25: [Breakpoint; 6] = tiers([12.0, 35.4, 55.4, 150.4, 250.4]);
static NOX: [Breakpoint; 6] = tiers([53.0, 100.0, 360.0, 649.0, 1249.0]);
static CO: [Breakpoint; 6] = tiers([4.4, 9.4, 12.4, 15.4, 30.4]);
static SO2: [Breakpoint; 6] = tiers([35.0, 75.0, 185.0, 304.0, 604.0]);

pub fn breakpoints(pollutant: Pollutant) -> &'static [Breakpoint] {
    match pollutant {
        Pollutant::O3 => &O3,
        Pollutant::Pm10 => &PM10,
        Pollutant::Pm25 => &PM25,
        Pollutant::Nox => &NOX,
        Pollutant::Co => &CO,
        Pollutant::So2 => &SO2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: &'static str,
    pub color: &'static str,
}

impl From<Category> for Classification {
    fn from(category: Category) -> Self {
        Self {
            category: category.label(),
            color: category.color(),
        }
    }
}

/// Category tier for a concentration. Unknown pollutant codes use the ozone table.
pub fn category_for(parameter: &str, value: f64) -> Category {
    if !value.is_finite() {
        return Category::Unknown;
    }

    let pollutant = Pollutant::from_code(parameter).unwrap_or(Pollutant::O3);
    breakpoints(pollutant)
        .iter()
        .find(|tier| value <= tier.upper)
        .map(|tier| tier.category)
        .unwrap_or(Category::Hazardous)
}

pub fn classify(parameter: &str, value: f64) -> Classification {
    category_for(parameter, value).into()
}
