//! Invalidation plan generation.
//!
//! Maps a mutation to the tags whose entries must go. Cascades are wide on
//! purpose: an extra miss is cheap, a stale hit is a bug.

use std::collections::BTreeSet;
use std::fmt;

use super::keys::{Namespace, Tag};
use super::mutation::Mutation;

const FINANCIAL: [Namespace; 6] = [
    Namespace::Invoice,
    Namespace::Payment,
    Namespace::Payout,
    Namespace::Expense,
    Namespace::Dashboard,
    Namespace::Report,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationPlan {
    /// Remove every entry carrying at least one of these tags.
    Tags(BTreeSet<Tag>),
    /// Remove everything.
    PurgeAll,
}

impl InvalidationPlan {
    pub fn from_mutation(mutation: &Mutation) -> Self {
        let mut tags = BTreeSet::new();

        match mutation {
            Mutation::Booking {
                booking_id,
                customer_id,
                vehicle_id,
            } => {
                add_namespaces(
                    &mut tags,
                    &[
                        Namespace::Booking,
                        Namespace::Vehicle,
                        Namespace::Dashboard,
                        Namespace::Report,
                    ],
                );
                add_entity(&mut tags, Namespace::Booking, booking_id.as_ref());
                add_entity(&mut tags, Namespace::Customer, customer_id.as_ref());
                add_entity(&mut tags, Namespace::Vehicle, vehicle_id.as_ref());
            }
            Mutation::Vehicle { vehicle_id } => {
                add_namespaces(
                    &mut tags,
                    &[
                        Namespace::Vehicle,
                        Namespace::Booking,
                        Namespace::Maintenance,
                        Namespace::Dashboard,
                        Namespace::Report,
                    ],
                );
                add_entity(&mut tags, Namespace::Vehicle, vehicle_id.as_ref());
            }
            Mutation::Customer { customer_id } => {
                add_namespaces(
                    &mut tags,
                    &[Namespace::Customer, Namespace::Booking, Namespace::Dashboard],
                );
                add_entity(&mut tags, Namespace::Customer, customer_id.as_ref());
            }
            Mutation::Dashboard { user_id } => {
                tags.insert(Tag::Namespace(Namespace::Dashboard));
                if let Some(user_id) = user_id {
                    tags.insert(Tag::user(user_id));
                }
            }
            Mutation::Financial => add_namespaces(&mut tags, &FINANCIAL),
            Mutation::Expense { expense_id } => {
                add_namespaces(&mut tags, &FINANCIAL);
                add_entity(&mut tags, Namespace::Expense, expense_id.as_ref());
            }
            Mutation::Maintenance { vehicle_id } => {
                add_namespaces(
                    &mut tags,
                    &[
                        Namespace::Maintenance,
                        Namespace::Vehicle,
                        Namespace::Dashboard,
                    ],
                );
                add_entity(&mut tags, Namespace::Vehicle, vehicle_id.as_ref());
            }
            Mutation::All => return Self::PurgeAll,
        }

        Self::Tags(tags)
    }

    pub fn tags(&self) -> Option<&BTreeSet<Tag>> {
        match self {
            Self::Tags(tags) => Some(tags),
            Self::PurgeAll => None,
        }
    }
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PurgeAll => f.write_str("InvalidationPlan { purge_all }"),
            Self::Tags(tags) => {
                let names: Vec<String> = tags.iter().map(ToString::to_string).collect();
                write!(f, "InvalidationPlan {{ tags: [{}] }}", names.join(", "))
            }
        }
    }
}

fn add_namespaces(tags: &mut BTreeSet<Tag>, namespaces: &[Namespace]) {
    tags.extend(namespaces.iter().copied().map(Tag::Namespace));
}

fn add_entity(tags: &mut BTreeSet<Tag>, namespace: Namespace, id: Option<&impl fmt::Display>) {
    if let Some(id) = id {
        tags.insert(Tag::entity(namespace, id));
    }
}
