//! Геометрия для посещаемости с геозоной: расстояния, радиусы, проверки координат.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// Приблизительные границы Боливии
const BOLIVIA_LAT: (f64, f64) = (-22.9, -9.7);
const BOLIVIA_LON: (f64, f64) = (-69.6, -57.5);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::validation("latitude must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::validation("longitude must be between -180 and 180"));
        }
        Ok(Coordinate { latitude, longitude })
    }

    pub fn in_bolivia(&self) -> bool {
        (BOLIVIA_LAT.0..=BOLIVIA_LAT.1).contains(&self.latitude)
            && (BOLIVIA_LON.0..=BOLIVIA_LON.1).contains(&self.longitude)
    }
}

/// Расстояние по формуле гаверсинусов в метрах, округлено до сантиметров.
pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    round_to(EARTH_RADIUS_M * c, 2)
}

/// (внутри радиуса, расстояние до центра)
pub fn within_radius(point: Coordinate, center: Coordinate, radius_m: f64) -> (bool, f64) {
    let distance = haversine_m(point, center);
    (distance <= radius_m, distance)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coverage {
    pub radius_m: i64,
    pub area_m2: f64,
    pub area_hectares: f64,
    pub diameter_m: i64,
}

pub fn coverage(radius_m: i64) -> Coverage {
    let area = std::f64::consts::PI * (radius_m as f64).powi(2);
    Coverage {
        radius_m,
        area_m2: round_to(area, 2),
        area_hectares: round_to(area / 10_000.0, 4),
        diameter_m: radius_m * 2,
    }
}

/// Точки окружности вокруг центра (для отрисовки зоны на карте).
pub fn circle_points(center: Coordinate, radius_m: f64, count: usize) -> Vec<Coordinate> {
    let lat_rad = center.latitude.to_radians();
    (0..count)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / count as f64;
            let d_lat = (radius_m * angle.cos() / EARTH_RADIUS_M).to_degrees();
            let d_lon = (radius_m * angle.sin() / (EARTH_RADIUS_M * lat_rad.cos())).to_degrees();
            Coordinate {
                latitude: center.latitude + d_lat,
                longitude: center.longitude + d_lon,
            }
        })
        .collect()
}

/// Рекомендуемый радиус по типу помещения; неизвестный тип - 100 м.
pub fn recommended_radius(place_kind: &str) -> i64 {
    match place_kind {
        "small_room" => 20,
        "classroom" => 50,
        "auditorium" => 100,
        "lab" => 30,
        "library" => 75,
        "yard" => 150,
        "sports_field" => 200,
        "outdoor" => 100,
        _ => 100,
    }
}

pub fn gps_precision_label(precision_m: f64) -> String {
    if precision_m <= 3.0 {
        "excellent (<= 3m)".to_string()
    } else if precision_m <= 5.0 {
        "very good (<= 5m)".to_string()
    } else if precision_m <= 10.0 {
        "good (<= 10m)".to_string()
    } else if precision_m <= 20.0 {
        "fair (<= 20m)".to_string()
    } else {
        format!("low ({precision_m:.0}m)")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LocationCheck {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Проверка точки, заданной преподавателем при открытии сессии.
pub fn validate_teacher_location(coord: Coordinate) -> LocationCheck {
    let mut check = LocationCheck { valid: true, ..Default::default() };
    if !coord.in_bolivia() {
        check.warnings.push("location appears to be outside Bolivia".to_string());
    }
    if coord.latitude == 0.0 && coord.longitude == 0.0 {
        check.valid = false;
        check.errors.push("invalid coordinates (0,0)".to_string());
    }
    check
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentLocationCheck {
    pub can_mark: bool,
    pub distance_m: f64,
    pub allowed_radius_m: i64,
    pub difference_m: f64,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

pub fn validate_student_location(
    student: Coordinate,
    teacher: Coordinate,
    allowed_radius_m: i64,
    gps_precision_m: Option<f64>,
) -> StudentLocationCheck {
    let distance = haversine_m(student, teacher);
    let radius = allowed_radius_m as f64;
    let inside = distance <= radius;
    let mut check = StudentLocationCheck {
        can_mark: inside,
        distance_m: distance,
        allowed_radius_m,
        difference_m: round_to(distance - radius, 2),
        warnings: Vec::new(),
        suggestions: Vec::new(),
    };
    if !inside {
        check.suggestions.push(format!("move {:.0}m closer to the classroom", distance - radius));
    }
    if let Some(precision) = gps_precision_m.filter(|p| *p > 10.0) {
        check.warnings.push(format!("low GPS precision ({precision:.0}m), look for a better signal"));
    }
    if distance > radius * 2.0 {
        check.suggestions.push("check that you are at the right place".to_string());
    }
    check
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionPreset {
    pub name: &'static str,
    pub radius_m: i64,
    pub tolerance_minutes: i64,
    pub allow_late: bool,
    pub description: &'static str,
}

/// Типовые настройки сессий.
pub fn presets() -> Vec<SessionPreset> {
    let preset = |name, radius_m, tolerance_minutes, allow_late, description| SessionPreset {
        name,
        radius_m,
        tolerance_minutes,
        allow_late,
        description,
    };
    vec![
        preset("small_room", 20, 10, true, "small classroom (20-30 students)"),
        preset("classroom", 50, 15, true, "standard classroom (30-50 students)"),
        preset("auditorium", 100, 20, true, "auditorium (50+ students)"),
        preset("lab", 30, 5, false, "laboratory, punctuality required"),
        preset("open_field", 200, 30, true, "open or sports area"),
        preset("strict", 25, 0, false, "strict setup for exams"),
    ]
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(-17.78, -63.18).is_ok());
    }

    #[test]
    fn haversine_known_distances() {
        assert_eq!(haversine_m(c(-17.7833, -63.1821), c(-17.7833, -63.1821)), 0.0);
        // Один градус долготы на экваторе
        let d = haversine_m(c(0.0, 0.0), c(0.0, 1.0));
        assert!((d - 111_194.93).abs() < 0.01, "{d}");
    }

    #[test]
    fn radius_check_is_inclusive() {
        let center = c(-17.7833, -63.1821);
        let point = c(-17.7837, -63.1821);
        let (inside, distance) = within_radius(point, center, 50.0);
        assert!(inside);
        assert!(distance > 40.0 && distance < 50.0);
        let (inside, _) = within_radius(point, center, distance);
        assert!(inside);
        assert!(!within_radius(point, center, 10.0).0);
    }

    #[test]
    fn coverage_and_radii() {
        let cov = coverage(100);
        assert_eq!(cov.area_m2, 31415.93);
        assert_eq!(cov.area_hectares, 3.1416);
        assert_eq!(cov.diameter_m, 200);
        assert_eq!(recommended_radius("lab"), 30);
        assert_eq!(recommended_radius("sports_field"), 200);
        assert_eq!(recommended_radius("rooftop"), 100);
    }

    #[test]
    fn circle_points_stay_on_radius() {
        let center = c(-16.5, -68.15);
        let points = circle_points(center, 100.0, 16);
        assert_eq!(points.len(), 16);
        for p in points {
            let d = haversine_m(p, center);
            assert!((d - 100.0).abs() < 0.5, "{d}");
        }
    }

    #[test]
    fn location_validations() {
        let check = validate_teacher_location(Coordinate { latitude: 0.0, longitude: 0.0 });
        assert!(!check.valid);
        assert_eq!(check.warnings.len(), 1);
        assert!(validate_teacher_location(c(-17.78, -63.18)).warnings.is_empty());

        let teacher = c(-17.7833, -63.1821);
        let far = c(-17.7853, -63.1821);
        let check = validate_student_location(far, teacher, 50, Some(25.0));
        assert!(!check.can_mark);
        assert_eq!(check.suggestions.len(), 2);
        assert_eq!(check.warnings.len(), 1);
    }

    #[test]
    fn precision_labels() {
        assert!(gps_precision_label(2.0).starts_with("excellent"));
        assert!(gps_precision_label(15.0).starts_with("fair"));
        assert_eq!(gps_precision_label(42.4), "low (42m)");
    }
}
