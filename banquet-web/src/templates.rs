use askama::Template;
use banquet_core::forms::{ContactForm, FormErrors, ListingForm, LoginForm, ScheduleCallForm, SignupForm};

use crate::models::{ListingCard, PageContext, SelectOption};

#[derive(Template)]
#[template(path = "landing.html")]
pub struct LandingTemplate {
    pub ctx: PageContext,
    pub listings: Vec<ListingCard>,
    pub areas: Vec<SelectOption>,
    pub function_types: Vec<SelectOption>,
    pub location: String,
    pub guests: String,
    /// Guest count that was not a number and so was not applied.
    pub ignored_guests: Option<String>,
    pub filtered: bool,
}

#[derive(Template)]
#[template(path = "about.html")]
pub struct AboutTemplate {
    pub ctx: PageContext,
}

#[derive(Template)]
#[template(path = "banquet.html")]
pub struct BanquetListTemplate {
    pub ctx: PageContext,
    pub listings: Vec<ListingCard>,
}

#[derive(Template)]
#[template(path = "banquet_detail.html")]
pub struct BanquetDetailTemplate {
    pub ctx: PageContext,
    pub listing: ListingCard,
}

#[derive(Template)]
#[template(path = "signup.html")]
pub struct SignupTemplate {
    pub ctx: PageContext,
    pub form: SignupForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub form: LoginForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub form: ListingForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "schedule_call.html")]
pub struct ScheduleCallTemplate {
    pub ctx: PageContext,
    pub form: ScheduleCallForm,
    pub errors: FormErrors,
    pub time_slots: Vec<SelectOption>,
    pub reasons: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "contact.html")]
pub struct ContactTemplate {
    pub ctx: PageContext,
    pub form: ContactForm,
    pub errors: FormErrors,
    pub subjects: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub message: String,
}
