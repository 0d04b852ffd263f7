/// Cities where vehicles can be picked up, grouped by state.
pub const SERVED_CITIES: &[(&str, &[&str])] = &[
    (
        "Andhra Pradesh",
        &[
            "Visakhapatnam",
            "Vijayawada",
            "Guntur",
            "Nellore",
            "Kurnool",
            "Kadapa",
            "Tirupati",
            "Kakinada",
            "Rajahmundry",
            "Anantapur",
            "Eluru",
            "Machilipatnam",
        ],
    ),
    (
        "Telangana",
        &[
            "Hyderabad",
            "Warangal",
            "Nizamabad",
            "Karimnagar",
            "Ramagundam",
            "Khammam",
            "Mahbubnagar",
            "Nalgonda",
            "Adilabad",
            "Suryapet",
        ],
    ),
];

/// Resolve a user-entered city to its canonical served name.
/// Matching ignores case and surrounding whitespace.
pub fn served_city(input: &str) -> Option<&'static str> {
    let wanted = input.trim();
    if wanted.is_empty() {
        return None;
    }

    SERVED_CITIES
        .iter()
        .flat_map(|(_, cities)| cities.iter())
        .find(|city| city.eq_ignore_ascii_case(wanted))
        .copied()
}
