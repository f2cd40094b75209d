//! Deterministic player demographics from curated name lists.
//!
//! Names and emails are cosmetic: nothing downstream relies on them beyond
//! being present. All draws come from the caller's stream.

use crate::rng::StreamRng;

pub struct NameGenerator;

impl NameGenerator {
    pub fn first_name(rng: &mut StreamRng) -> &'static str {
        pick(rng, FIRST_NAMES)
    }

    pub fn last_name(rng: &mut StreamRng) -> &'static str {
        pick(rng, LAST_NAMES)
    }

    /// `first.last{seq}@domain`, lowercased, with anything but ASCII letters
    /// dropped from the name parts. The sequence number keeps it unique.
    pub fn email(rng: &mut StreamRng, first: &str, last: &str, seq: usize) -> String {
        let domain = pick(rng, EMAIL_DOMAINS);
        format!("{}.{}{seq}@{domain}", slug(first), slug(last))
    }
}

fn pick(rng: &mut StreamRng, list: &'static [&'static str]) -> &'static str {
    list[rng.next_u64_below(list.len() as u64) as usize]
}

fn slug(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

const EMAIL_DOMAINS: &[&str] = &["example.com", "example.net", "example.org", "mail.example"];

const FIRST_NAMES: &[&str] = &[
    "James", "John", "Robert", "Michael", "William", "David", "Richard", "Joseph",
    "Thomas", "Charles", "Christopher", "Daniel", "Matthew", "Anthony", "Mark",
    "Steven", "Paul", "Andrew", "Joshua", "Kevin", "Brian", "Ryan", "Jacob",
    "Nicholas", "Eric", "Tyler", "Aaron", "Jose", "Nathan", "Kyle", "Noah", "Ethan",
    "Sean", "Dylan", "Jordan", "Logan", "Mason", "Marcus", "Andre", "Luis",
    "Mary", "Patricia", "Jennifer", "Linda", "Elizabeth", "Susan", "Jessica", "Sarah",
    "Karen", "Lisa", "Nancy", "Ashley", "Emily", "Michelle", "Amanda", "Melissa",
    "Stephanie", "Rebecca", "Laura", "Nicole", "Rachel", "Maria", "Heather", "Olivia",
    "Victoria", "Lauren", "Megan", "Hannah", "Sophia", "Grace", "Natalie", "Ava",
    "Mia", "Priya", "Mei", "Aisha", "Camila", "Yuki", "Fatima", "Elena",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis",
    "Rodriguez", "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson",
    "Thomas", "Taylor", "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson",
    "White", "Harris", "Sanchez", "Clark", "Ramirez", "Lewis", "Robinson", "Walker",
    "Young", "Allen", "King", "Wright", "Scott", "Torres", "Nguyen", "Hill", "Flores",
    "Green", "Adams", "Nelson", "Baker", "Hall", "Rivera", "Campbell", "Mitchell",
    "Carter", "Roberts", "O'Brien", "Murphy", "Sullivan", "Kelly", "Patel", "Chen",
    "Kim", "Tran", "Cohen", "Rossi", "Kowalski", "Novak", "Silva", "Okafor",
];
