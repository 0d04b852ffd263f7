use std::collections::HashMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus, PaymentStatus};
use crate::entities::vehicle::{self, VehicleCategory};

const TOP_VEHICLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Week,
    #[default]
    Month,
    Year,
}

impl TimeRange {
    pub fn since(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days = match self {
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Year => 365,
        };
        now - Duration::days(days)
    }
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub total_vehicles: usize,
    pub total_cars: usize,
    pub total_bikes: usize,
    pub total_users: u64,
    pub total_bookings: usize,
    pub pending_bookings: usize,
    pub completed_bookings: usize,
    pub paid_bookings: usize,
    pub total_revenue: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusCount {
    pub status: BookingStatus,
    pub count: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VehicleBookings {
    pub vehicle_id: Uuid,
    pub name: String,
    pub bookings: usize,
}

#[derive(Debug, Serialize)]
pub struct Analytics {
    pub range: TimeRange,
    pub since: DateTime<Utc>,
    pub total_revenue: Decimal,
    pub total_bookings: usize,
    pub total_vehicles: usize,
    pub revenue_by_category: Vec<CategoryRevenue>,
    pub status_breakdown: Vec<StatusCount>,
    pub top_vehicles: Vec<VehicleBookings>,
    /// 24 buckets keyed by the UTC hour the rental starts.
    pub bookings_by_hour: Vec<usize>,
}

fn is_paid(booking: &booking::Model) -> bool {
    booking.payment_status == PaymentStatus::Paid
}

fn revenue<'a>(bookings: impl Iterator<Item = &'a booking::Model>) -> Decimal {
    bookings.filter(|b| is_paid(b)).map(|b| b.total_price).sum()
}

pub fn overview(
    vehicles: &[vehicle::Model],
    bookings: &[booking::Model],
    total_users: u64,
) -> Overview {
    let count_status = |status: BookingStatus| bookings.iter().filter(|b| b.status == status).count();

    Overview {
        total_vehicles: vehicles.len(),
        total_cars: vehicles.iter().filter(|v| v.category == VehicleCategory::Car).count(),
        total_bikes: vehicles.iter().filter(|v| v.category == VehicleCategory::Bike).count(),
        total_users,
        total_bookings: bookings.len(),
        pending_bookings: count_status(BookingStatus::Pending),
        completed_bookings: count_status(BookingStatus::Completed),
        paid_bookings: bookings.iter().filter(|b| is_paid(b)).count(),
        total_revenue: revenue(bookings.iter()),
    }
}

fn revenue_by_category(
    bookings: &[&booking::Model],
    vehicles: &HashMap<Uuid, &vehicle::Model>,
) -> Vec<CategoryRevenue> {
    let mut totals: HashMap<&str, Decimal> = HashMap::new();
    for booking in bookings.iter().filter(|b| is_paid(b)) {
        let category = vehicles
            .get(&booking.vehicle_id)
            .map(|v| v.category.as_str())
            .unwrap_or("unknown");
        *totals.entry(category).or_default() += booking.total_price;
    }

    let mut rows: Vec<CategoryRevenue> = totals
        .into_iter()
        .map(|(category, revenue)| CategoryRevenue {
            category: category.to_string(),
            revenue,
        })
        .collect();
    rows.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.category.cmp(&b.category)));
    rows
}

fn status_breakdown(bookings: &[&booking::Model]) -> Vec<StatusCount> {
    let mut counts: HashMap<BookingStatus, usize> = HashMap::new();
    for booking in bookings {
        *counts.entry(booking.status).or_default() += 1;
    }

    let mut rows: Vec<StatusCount> = counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.status.as_str().cmp(b.status.as_str()))
    });
    rows
}

/// Most booked vehicles. Catalog entries sharing a name (case-insensitive)
/// are collapsed into the one with the most bookings.
fn top_vehicles(bookings: &[&booking::Model], vehicles: &[vehicle::Model]) -> Vec<VehicleBookings> {
    let mut per_vehicle: HashMap<Uuid, usize> = HashMap::new();
    for booking in bookings {
        *per_vehicle.entry(booking.vehicle_id).or_default() += 1;
    }
    let count_of = |id: &Uuid| per_vehicle.get(id).copied().unwrap_or(0);

    let mut by_name: HashMap<String, &vehicle::Model> = HashMap::new();
    for vehicle in vehicles {
        let key = vehicle.name.to_lowercase();
        match by_name.get(&key) {
            Some(kept) if count_of(&kept.id) >= count_of(&vehicle.id) => {}
            _ => {
                by_name.insert(key, vehicle);
            }
        }
    }

    let mut rows: Vec<VehicleBookings> = by_name
        .into_values()
        .filter(|v| count_of(&v.id) > 0)
        .map(|v| VehicleBookings {
            vehicle_id: v.id,
            name: v.name.clone(),
            bookings: count_of(&v.id),
        })
        .collect();
    rows.sort_by(|a, b| b.bookings.cmp(&a.bookings).then_with(|| a.name.cmp(&b.name)));
    rows.truncate(TOP_VEHICLES);
    rows
}

fn bookings_by_hour(bookings: &[&booking::Model]) -> Vec<usize> {
    let mut hours = vec![0; 24];
    for booking in bookings {
        let hour = booking.start_date.with_timezone(&Utc).hour() as usize;
        hours[hour] += 1;
    }
    hours
}

/// Dashboard figures for bookings starting within `range` of `now`.
pub fn analytics(
    bookings: &[booking::Model],
    vehicles: &[vehicle::Model],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Analytics {
    let since = range.since(now);
    let in_range: Vec<&booking::Model> = bookings
        .iter()
        .filter(|b| b.start_date.with_timezone(&Utc) >= since)
        .collect();
    let catalog: HashMap<Uuid, &vehicle::Model> = vehicles.iter().map(|v| (v.id, v)).collect();

    Analytics {
        range,
        since,
        total_revenue: revenue(in_range.iter().copied()),
        total_bookings: in_range.len(),
        total_vehicles: vehicles.len(),
        revenue_by_category: revenue_by_category(&in_range, &catalog),
        status_breakdown: status_breakdown(&in_range),
        top_vehicles: top_vehicles(&in_range, vehicles),
        bookings_by_hour: bookings_by_hour(&in_range),
    }
}
