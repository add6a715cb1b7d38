use futures::stream::{self, Stream};
use log::debug;
use shared::{QueryParams, SortDirection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const FIRST_NAMES: [&str; 12] = [
    "Ada", "Alan", "Barbara", "Dennis", "Edsger", "Frances", "Grace", "Ken", "Linus", "Margaret",
    "Niklaus", "Radia",
];
const LAST_NAMES: [&str; 7] = ["Hopper", "Kay", "Liskov", "Perlman", "Ritchie", "Thompson", "Wirth"];

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: usize,
    pub name: String,
    pub email: String,
}

impl Person {
    fn generated(id: usize) -> Self {
        let index = id - 1;
        let first = FIRST_NAMES[index % FIRST_NAMES.len()];
        let last = LAST_NAMES[(index / FIRST_NAMES.len() + index) % LAST_NAMES.len()];
        Self {
            id,
            name: format!("{first} {last}"),
            email: format!("{}.{}{id}@example.org", first.to_lowercase(), last.to_lowercase()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("unknown sort column '{0}'")]
    UnknownColumn(String),
    #[error("service unavailable (request #{request})")]
    Unavailable { request: usize },
}

/// In-memory people directory that answers `skip`/`take`/`sortBy`/`sortDirection`
/// queries after a fixed latency.
#[derive(Debug, Clone)]
pub struct FakeApi {
    people: Arc<Mutex<Vec<Person>>>,
    latency: Duration,
    fail_every: Option<usize>,
    requests: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn new(records: usize) -> Self {
        let people = (1..=records).map(Person::generated).collect();
        Self {
            people: Arc::new(Mutex::new(people)),
            latency: Duration::ZERO,
            fail_every: None,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Every n-th request fails with [`ApiError::Unavailable`].
    pub fn with_fail_every(mut self, fail_every: Option<usize>) -> Self {
        self.fail_every = fail_every.filter(|n| *n > 0);
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn record_count(&self) -> usize {
        self.lock_people().len()
    }

    /// Adds a generated person and returns it.
    pub fn insert_next(&self) -> Person {
        let mut people = self.lock_people();
        let person = Person::generated(people.len() + 1);
        people.push(person.clone());
        person
    }

    /// One request: resolved now, delivered after the configured latency.
    pub fn list_people(
        &self,
        params: &QueryParams,
    ) -> impl Stream<Item = Result<Vec<Person>, ApiError>> + Send + use<> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[API] request #{request} {:?}", params.to_pairs());

        let response = self.respond(request, params);
        let latency = self.latency;
        stream::once(async move {
            tokio::time::sleep(latency).await;
            response
        })
    }

    fn respond(&self, request: usize, params: &QueryParams) -> Result<Vec<Person>, ApiError> {
        if self.fail_every.is_some_and(|n| request % n == 0) {
            return Err(ApiError::Unavailable { request });
        }

        let mut people = self.lock_people().clone();
        if let Some(sort) = params.sort() {
            match sort.column.as_str() {
                "id" => people.sort_by_key(|person| person.id),
                "name" => people.sort_by(|a, b| a.name.cmp(&b.name)),
                "email" => people.sort_by(|a, b| a.email.cmp(&b.email)),
                other => return Err(ApiError::UnknownColumn(other.to_string())),
            }
            if sort.direction == SortDirection::Desc {
                people.reverse();
            }
        }

        Ok(match params.window() {
            Some(window) => people.into_iter().skip(window.skip).take(window.take).collect(),
            None => people,
        })
    }

    fn lock_people(&self) -> std::sync::MutexGuard<'_, Vec<Person>> {
        self.people.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
