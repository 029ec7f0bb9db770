//! Local itinerary generation from the attraction table
//!
//! Used when the chat-completion provider cannot be reached. Given the same
//! preferences, table and start date the output is always the same.

use crate::attractions::{AttractionRecord, AttractionTable, CityAttractions, InterestCategory};
use crate::{date_label, Activity, DayPlan, TravelPlan, TravelPreferences};
use chrono::{Days, NaiveDate};
use tracing::{debug, info};

const MAX_ATTRACTIONS: usize = 4;
const FIRST_SLOT_HOUR: usize = 9;
const SLOT_HOURS: usize = 3;
const LUNCH_HOUR: usize = 12;
const LUNCH_COST: f64 = 80.0;
const GENERIC_TOUR_COST: f64 = 100.0;
const GENERIC_CUISINE_COST: f64 = 150.0;

/// Build a plan for `prefs` without any remote call
pub fn generate_fallback_plan(
    prefs: &TravelPreferences,
    table: &AttractionTable,
    start_date: NaiveDate,
) -> TravelPlan {
    let place = prefs.place();

    let days = match table.city(place) {
        Some(city) => plan_city_days(city, prefs, start_date),
        None => {
            info!(place = place, "City not in attraction table, using generic plan");
            vec![generic_day(place, start_date)]
        }
    };

    let plan = TravelPlan {
        total_cost: days
            .iter()
            .flat_map(|day| day.activities.iter())
            .map(|activity| activity.cost)
            .sum(),
        days,
        recommended_group_size: prefs.group_size_label(),
        start_date: date_label(start_date),
    };

    info!(
        place = place,
        days = plan.days.len(),
        activities = plan.activity_count(),
        total_cost = plan.total_cost,
        "Generated local fallback plan"
    );
    plan
}

/// Attractions for the interests, capped, in category then table order
pub fn select_attractions<'a>(city: &'a CityAttractions, interests: &str) -> Vec<&'a AttractionRecord> {
    let matched = InterestCategory::matching(interests);

    let mut selected: Vec<&AttractionRecord> = matched
        .iter()
        .flat_map(|category| city.category(*category).iter())
        .collect();

    if selected.is_empty() {
        debug!(matched = matched.len(), "No interest-specific attractions, taking table order");
        selected = city.all_attractions().collect();
    }

    selected.truncate(MAX_ATTRACTIONS);
    selected
}

fn plan_city_days(city: &CityAttractions, prefs: &TravelPreferences, start_date: NaiveDate) -> Vec<DayPlan> {
    let selected = select_attractions(city, &prefs.interests);
    let day_count = prefs.duration() as usize;
    let per_day = selected.len().div_ceil(day_count).max(1);
    let lunch_every_day = !city.has_food_category();

    debug!(
        selected = selected.len(),
        per_day = per_day,
        lunch_every_day = lunch_every_day,
        "Distributing attractions over days"
    );

    let mut chunks = selected.chunks(per_day);

    (0..day_count)
        .map(|day_index| {
            let day_attractions = chunks.next().unwrap_or(&[]);
            let with_lunch = day_index == 0 || lunch_every_day;
            DayPlan {
                date: day_date(start_date, day_index),
                activities: schedule_day(day_attractions, &city.city, with_lunch),
            }
        })
        .collect()
}

/// Lay out one day's attractions in 3-hour slots from 09:00. Lunch takes the
/// first slot boundary at or after noon and pushes later slots back an hour.
fn schedule_day(attractions: &[&AttractionRecord], city: &str, with_lunch: bool) -> Vec<Activity> {
    let mut activities = Vec::with_capacity(attractions.len() + 1);
    let mut hour = FIRST_SLOT_HOUR;
    let mut lunch_pending = with_lunch;

    for attraction in attractions {
        if lunch_pending && hour >= LUNCH_HOUR {
            activities.push(lunch_activity(city));
            hour += 1;
            lunch_pending = false;
        }
        activities.push(attraction_activity(attraction, city, hour));
        hour += SLOT_HOURS;
    }
    if lunch_pending {
        activities.push(lunch_activity(city));
    }
    activities
}

fn attraction_activity(attraction: &AttractionRecord, city: &str, start: usize) -> Activity {
    Activity {
        name: attraction.name.clone(),
        description: attraction.description.clone(),
        location: city.to_string(),
        time: format!("{:02}:00-{:02}:00", start, start + SLOT_HOURS),
        cost: attraction.cost,
        transportation: "公共交通或打车".to_string(),
    }
}

fn lunch_activity(city: &str) -> Activity {
    Activity {
        name: "当地特色午餐".to_string(),
        description: format!("在{}品尝地道的本地风味", city),
        location: city.to_string(),
        time: format!("{:02}:00-{:02}:00", LUNCH_HOUR, LUNCH_HOUR + 1),
        cost: LUNCH_COST,
        transportation: "步行".to_string(),
    }
}

fn generic_day(place: &str, start_date: NaiveDate) -> DayPlan {
    DayPlan {
        date: date_label(start_date),
        activities: vec![
            Activity {
                name: "城市文化之旅".to_string(),
                description: format!("游览{}的标志性景点，了解当地历史文化", place),
                location: place.to_string(),
                time: "09:00-12:00".to_string(),
                cost: GENERIC_TOUR_COST,
                transportation: "公共交通".to_string(),
            },
            Activity {
                name: "当地美食体验".to_string(),
                description: format!("品尝{}的特色美食", place),
                location: place.to_string(),
                time: "12:00-14:00".to_string(),
                cost: GENERIC_CUISINE_COST,
                transportation: "步行".to_string(),
            },
        ],
    }
}

fn day_date(start_date: NaiveDate, day_index: usize) -> String {
    start_date
        .checked_add_days(Days::new(day_index as u64))
        .map(date_label)
        .unwrap_or_else(|| format!("第{}天", day_index + 1))
}
