use super::repository::{DeliveryPartner, DeliveryPartnerStatus};
use std::cmp::Ordering;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

pub fn haversine_km(a: Point, b: Point) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[derive(Clone, Debug)]
pub struct Candidate {
    pub partner: DeliveryPartner,
    pub distance_km: f64,
}

/// Available partners with a known position within `radius_km` of `origin`,
/// nearest first. Ties go to the partner with fewer deliveries, then by id.
pub fn rank_candidates(
    origin: Point,
    partners: Vec<DeliveryPartner>,
    radius_km: f64,
) -> Vec<Candidate> {
    let mut candidates = partners
        .into_iter()
        .filter(|partner| partner.status == DeliveryPartnerStatus::Available)
        .filter_map(|partner| {
            let position = Point::new(partner.current_lat?, partner.current_lng?);
            let distance_km = haversine_km(origin, position);
            (distance_km <= radius_km).then_some(Candidate {
                partner,
                distance_km,
            })
        })
        .collect::<Vec<_>>();

    candidates.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.partner.total_deliveries.cmp(&b.partner.total_deliveries))
            .then_with(|| a.partner.id.cmp(&b.partner.id))
    });

    candidates
}

/// Partners still free during one dispatch run. Loaded once and shrunk as
/// partners get reserved, so a run never rereads the partner table.
#[derive(Default)]
pub struct PartnerPool {
    partners: Vec<DeliveryPartner>,
}

impl PartnerPool {
    pub fn new(partners: Vec<DeliveryPartner>) -> Self {
        Self { partners }
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn rank(&self, origin: Point, radius_km: f64) -> Vec<Candidate> {
        rank_candidates(origin, self.partners.clone(), radius_km)
    }

    pub fn remove(&mut self, partner_id: &str) {
        self.partners.retain(|partner| partner.id != partner_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    fn partner(id: &str, status: DeliveryPartnerStatus, at: Option<(f64, f64)>, deliveries: i32) -> DeliveryPartner {
        DeliveryPartner {
            id: id.to_string(),
            user_id: format!("user-{}", id),
            vehicle_type: "BIKE".to_string(),
            status,
            earnings: BigDecimal::from(0),
            total_deliveries: deliveries,
            current_lat: at.map(|(lat, _)| lat),
            current_lng: at.map(|(_, lng)| lng),
            location_updated_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn haversine_is_zero_for_same_point() {
        let p = Point::new(12.9716, 77.5946);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Bengaluru to Chennai is roughly 290 km as the crow flies.
        let blr = Point::new(12.9716, 77.5946);
        let maa = Point::new(13.0827, 80.2707);
        let d = haversine_km(blr, maa);
        assert!((280.0..300.0).contains(&d), "got {}", d);
        assert!((haversine_km(maa, blr) - d).abs() < 1e-9);
    }

    #[test]
    fn ranks_nearest_available_first() {
        let origin = Point::new(12.9716, 77.5946);
        let ranked = rank_candidates(
            origin,
            vec![
                partner("far", DeliveryPartnerStatus::Available, Some((13.0, 77.6)), 0),
                partner("near", DeliveryPartnerStatus::Available, Some((12.972, 77.595)), 10),
                partner("busy", DeliveryPartnerStatus::Busy, Some((12.9716, 77.5946)), 0),
                partner("offline", DeliveryPartnerStatus::Offline, Some((12.9716, 77.5946)), 0),
                partner("unknown", DeliveryPartnerStatus::Available, None, 0),
            ],
            10.0,
        );

        let ids = ranked.iter().map(|c| c.partner.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["near", "far"]);
    }

    #[test]
    fn excludes_partners_outside_radius() {
        let origin = Point::new(12.9716, 77.5946);
        let ranked = rank_candidates(
            origin,
            vec![partner("chennai", DeliveryPartnerStatus::Available, Some((13.0827, 80.2707)), 0)],
            10.0,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn breaks_ties_by_deliveries_then_id() {
        let origin = Point::new(12.9716, 77.5946);
        let spot = Some((12.98, 77.60));
        let ranked = rank_candidates(
            origin,
            vec![
                partner("b", DeliveryPartnerStatus::Available, spot, 3),
                partner("c", DeliveryPartnerStatus::Available, spot, 1),
                partner("a", DeliveryPartnerStatus::Available, spot, 3),
            ],
            10.0,
        );

        let ids = ranked.iter().map(|c| c.partner.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn pool_stops_offering_reserved_partners() {
        let origin = Point::new(12.9716, 77.5946);
        let mut pool = PartnerPool::new(vec![
            partner("near", DeliveryPartnerStatus::Available, Some((12.972, 77.595)), 0),
            partner("far", DeliveryPartnerStatus::Available, Some((13.0, 77.6)), 0),
        ]);

        pool.remove("near");
        let ids = pool
            .rank(origin, 10.0)
            .into_iter()
            .map(|c| c.partner.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["far".to_string()]);

        pool.remove("far");
        assert!(pool.is_empty());
        assert!(pool.rank(origin, 10.0).is_empty());
    }

    #[test]
    fn pool_keeps_offering_partners_to_orders_elsewhere() {
        // A zone without riders must not use up the pool for other zones.
        let bengaluru = Point::new(12.9716, 77.5946);
        let chennai = Point::new(13.0827, 80.2707);
        let pool = PartnerPool::new(vec![partner(
            "chennai",
            DeliveryPartnerStatus::Available,
            Some((13.08, 80.27)),
            0,
        )]);

        assert!(pool.rank(bengaluru, 10.0).is_empty());
        assert_eq!(pool.rank(chennai, 10.0).len(), 1);
    }
}
