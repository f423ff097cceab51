//! Message copy for every reminder stage, in both supported languages.
//!
//! One body per (stage, language) pair serves both channels: WhatsApp sends
//! it as-is, email wraps it in the HTML shell from `templates/` and attaches
//! the same text as the plain part. Placeholders are `{name}`, `{rsvp_link}`
//! and `{deadline}`.

use crate::channel::phone::detect_language;
use crate::schedule::Stage;
use askama::Template;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use time::Date;

/// Languages the copy catalog covers. Spanish is the wedding's home
/// language; English covers everyone else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Es,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Language> {
        match code {
            "es" => Some(Language::Es),
            "en" => Some(Language::En),
            _ => None,
        }
    }
}

/// Language to address a guest in.
///
/// An explicit, supported preference always wins. Otherwise the phone's
/// country code decides, and guests without a phone get English.
pub fn language_for_guest(
    explicit: Option<&str>,
    phone: Option<&str>,
    default_country_code: &str,
) -> Language {
    if let Some(language) = explicit.and_then(Language::from_code) {
        return language;
    }
    match phone {
        Some(p) if !p.trim().is_empty() => detect_language(p, default_country_code),
        _ => Language::En,
    }
}

pub struct MessageTemplate {
    pub subject: &'static str,
    pub body: &'static str,
}

static CATALOG: Lazy<HashMap<(Stage, Language), MessageTemplate>> = Lazy::new(|| {
    use Language::{En, Es};
    use Stage::*;

    let mut map = HashMap::new();
    map.insert(
        (Initial, Es),
        MessageTemplate {
            subject: "Recordatorio RSVP - 30 Días Restantes",
            body: "Hola {name}:\n\n\
                   Te recordamos que aún no has confirmado tu asistencia a nuestra boda. \
                   Quedan 30 días para la fecha límite ({deadline}).\n\n\
                   Confirma tu asistencia aquí:\n{rsvp_link}\n\n\
                   ¡Gracias!",
        },
    );
    map.insert(
        (Initial, En),
        MessageTemplate {
            subject: "RSVP Reminder - 30 Days Left",
            body: "Hello {name},\n\n\
                   This is a reminder that you haven't confirmed your attendance to our \
                   wedding yet. There are 30 days left until the deadline ({deadline}).\n\n\
                   Please confirm here:\n{rsvp_link}\n\n\
                   Thank you!",
        },
    );
    map.insert(
        (FirstFollowup, Es),
        MessageTemplate {
            subject: "Recordatorio RSVP - 2 Semanas Restantes",
            body: "Hola {name}:\n\n\
                   Quedan solo 2 semanas para confirmar tu asistencia a nuestra boda. \
                   Por favor, responde antes del {deadline}:\n{rsvp_link}\n\n\
                   ¡Gracias por tu respuesta!",
        },
    );
    map.insert(
        (FirstFollowup, En),
        MessageTemplate {
            subject: "RSVP Reminder - 2 Weeks Left",
            body: "Hello {name},\n\n\
                   Only 2 weeks left to confirm your attendance to our wedding. \
                   Please respond before {deadline}:\n{rsvp_link}\n\n\
                   Thank you for your response!",
        },
    );
    map.insert(
        (SecondFollowup, Es),
        MessageTemplate {
            subject: "Recordatorio RSVP - 1 Semana Restante",
            body: "Hola {name}:\n\n\
                   ¡Solo queda 1 semana para confirmar! Necesitamos tu respuesta antes \
                   del {deadline}. Por favor, confirma lo antes posible:\n{rsvp_link}\n\n\
                   ¡Gracias!",
        },
    );
    map.insert(
        (SecondFollowup, En),
        MessageTemplate {
            subject: "RSVP Reminder - 1 Week Left",
            body: "Hello {name},\n\n\
                   Only 1 week left to confirm! We need your response before {deadline}. \
                   Please confirm as soon as possible:\n{rsvp_link}\n\n\
                   Thank you!",
        },
    );
    map.insert(
        (Final, Es),
        MessageTemplate {
            subject: "Recordatorio Final RSVP - ¡3 Días Restantes!",
            body: "Hola {name}:\n\n\
                   ÚLTIMO RECORDATORIO: quedan solo 3 días para confirmar tu asistencia. \
                   Después del {deadline} no podremos garantizar tu plaza.\n\n\
                   {rsvp_link}\n\n\
                   Si tienes algún problema, contacta con nosotros.",
        },
    );
    map.insert(
        (Final, En),
        MessageTemplate {
            subject: "Final RSVP Reminder - 3 Days Left!",
            body: "Hello {name},\n\n\
                   FINAL REMINDER: only 3 days left to confirm your attendance. \
                   After {deadline} we cannot guarantee your spot.\n\n\
                   {rsvp_link}\n\n\
                   If you have any issues, please contact us.",
        },
    );
    map.insert(
        (Manual, Es),
        MessageTemplate {
            subject: "Recordatorio RSVP para Nuestra Boda",
            body: "Hola {name}:\n\n\
                   Aún no hemos recibido tu confirmación para nuestra boda. \
                   Puedes responder antes del {deadline} en este enlace:\n{rsvp_link}\n\n\
                   ¡Gracias!",
        },
    );
    map.insert(
        (Manual, En),
        MessageTemplate {
            subject: "RSVP Reminder for Our Wedding",
            body: "Hello {name},\n\n\
                   We haven't received your confirmation for our wedding yet. \
                   You can respond before {deadline} using this link:\n{rsvp_link}\n\n\
                   Thank you!",
        },
    );
    map
});

const INVITATION_ES: &str = "Hola {name}:\n\n\
    Estás invitado/a a nuestra boda. Por favor, confirma tu asistencia antes \
    del {deadline} haciendo clic en el siguiente enlace:\n{rsvp_link}\n\n\
    ¡Esperamos verte allí!";

const INVITATION_EN: &str = "Hello {name},\n\n\
    You are invited to our wedding. Please confirm your attendance before \
    {deadline} by clicking the following link:\n{rsvp_link}\n\n\
    We hope to see you there!";

/// Rendered subject and body for one reminder.
#[derive(Debug, Clone)]
pub struct ReminderCopy {
    pub subject: String,
    pub body: String,
}

/// Render the copy for a stage in the given language. An operator note (from
/// manual sends) is appended as its own paragraph.
pub fn reminder_copy(
    stage: Stage,
    language: Language,
    name: &str,
    rsvp_link: &str,
    deadline: Date,
    note: Option<&str>,
) -> ReminderCopy {
    let template = CATALOG
        .get(&(stage, language))
        .or_else(|| CATALOG.get(&(stage, Language::En)))
        .unwrap_or_else(|| &CATALOG[&(Stage::Initial, Language::En)]);

    let mut body = interpolate(template.body, name, rsvp_link, deadline, language);
    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        body.push_str("\n\n");
        body.push_str(note);
    }

    ReminderCopy {
        subject: template.subject.to_string(),
        body,
    }
}

/// Invitation copy for the initial RSVP-link send.
pub fn invitation_copy(language: Language, name: &str, rsvp_link: &str, deadline: Date) -> String {
    let template = match language {
        Language::Es => INVITATION_ES,
        Language::En => INVITATION_EN,
    };
    interpolate(template, name, rsvp_link, deadline, language)
}

fn interpolate(
    template: &str,
    name: &str,
    rsvp_link: &str,
    deadline: Date,
    language: Language,
) -> String {
    template
        .replace("{name}", name)
        .replace("{rsvp_link}", rsvp_link)
        .replace("{deadline}", &format_deadline(deadline, language))
}

/// Human-facing deadline, per language: "6 de mayo de 2026" / "May 6, 2026".
pub fn format_deadline(date: Date, language: Language) -> String {
    let month = date.month() as usize - 1;
    match language {
        Language::Es => {
            const MONTHS: [&str; 12] = [
                "enero",
                "febrero",
                "marzo",
                "abril",
                "mayo",
                "junio",
                "julio",
                "agosto",
                "septiembre",
                "octubre",
                "noviembre",
                "diciembre",
            ];
            format!("{} de {} de {}", date.day(), MONTHS[month], date.year())
        }
        Language::En => {
            const MONTHS: [&str; 12] = [
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ];
            format!("{} {}, {}", MONTHS[month], date.day(), date.year())
        }
    }
}

/// HTML shell for the email variant of a reminder.
#[derive(Template)]
#[template(path = "reminder_email.html")]
pub struct ReminderEmailTemplate {
    pub subject: String,
    pub paragraphs: Vec<String>,
    pub rsvp_link: String,
    pub cta_label: String,
}

impl ReminderEmailTemplate {
    /// Build the HTML variant from already-rendered copy.
    pub fn from_copy(copy: &ReminderCopy, rsvp_link: &str, language: Language) -> Self {
        // The plain-text body doubles as the source for the HTML paragraphs;
        // the raw link line is dropped because the shell renders a button.
        let paragraphs = copy
            .body
            .split("\n\n")
            .map(|paragraph| paragraph.replace('\n', " "))
            .map(|paragraph| paragraph.replace(rsvp_link, "").trim().to_string())
            .filter(|paragraph| !paragraph.is_empty())
            .collect();
        Self {
            subject: copy.subject.clone(),
            paragraphs,
            rsvp_link: rsvp_link.to_string(),
            cta_label: match language {
                Language::Es => "Confirmar asistencia".to_string(),
                Language::En => "Confirm attendance".to_string(),
            },
        }
    }

    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }
}
