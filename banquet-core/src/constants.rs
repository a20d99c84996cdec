/// Kanpur localities offered in the landing page area dropdown.
pub const KANPUR_AREAS: &[&str] = &[
    "Arya Nagar",
    "Azad Nagar",
    "Barra",
    "Civil Lines",
    "Govind Nagar",
    "Harsh Nagar",
    "Kakadeo",
    "Kalyanpur",
    "Kidwai Nagar",
    "Lal Bangla",
    "Mall Road",
    "Panki",
    "Rawatpur",
    "Shyam Nagar",
    "Swaroop Nagar",
    "Tilak Nagar",
    "Vikas Nagar",
    "Yashoda Nagar",
];

/// Function types a listing can be tagged with.
pub const FUNCTION_TYPES: &[&str] = &[
    "Wedding",
    "Reception",
    "Engagement",
    "Birthday",
    "Corporate",
    "Anniversary",
];

/// Call slots offered on the schedule-call form.
pub const TIME_SLOTS: &[&str] = &[
    "10:00 AM - 10:30 AM",
    "11:00 AM - 11:30 AM",
    "12:00 PM - 12:30 PM",
    "02:00 PM - 02:30 PM",
    "03:00 PM - 03:30 PM",
    "04:00 PM - 04:30 PM",
    "05:00 PM - 05:30 PM",
];
