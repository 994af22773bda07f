#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use gicat_driver::client::GiCatClient;
use gicat_driver::config::ServiceEndpoint;
use gicat_driver::error::GiCatError;
use gicat_driver::harvest::{HarvestEvent, ProgressSink};
use gicat_driver::http::{HttpResponse, HttpTransport, Method, Request};

pub const BASE_URL: &str = "http://gicat.test/gi-cat";

pub const PROFILE_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<brokerConfiguration id="1" name="SNOW">
  <component>
    <id>D1</id>
    <title>distributor</title>
  </component>
</brokerConfiguration>"#;

pub const DISTRIBUTOR_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<distributor>
  <component><id>R1</id><title>Snow</title></component>
  <component><id>R2</id><title>Ice</title></component>
</distributor>"#;

pub const PROFILES_DOC: &str = r#"<brokerConfigurations>
  <brokerConfiguration id="1" name="SNOW"/>
  <brokerConfiguration id="2" name="NORWEGIAN_CISL_NSIDC_EOL"/>
</brokerConfigurations>"#;

pub fn status_doc(text: &str) -> String {
    format!("<harvest><status>{text}</status></harvest>")
}

pub fn distributor_doc(resources: &[(&str, &str)]) -> String {
    let components: String = resources
        .iter()
        .map(|(id, title)| format!("<component><id>{id}</id><title>{title}</title></component>"))
        .collect();
    format!("<distributor>{components}</distributor>")
}

struct Route {
    method: Method,
    path: String,
    query: Option<(String, String)>,
    responses: VecDeque<HttpResponse>,
}

/// In-memory GI-Cat: canned responses per route, the last one repeating.
#[derive(Default)]
pub struct FakeGiCat {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<Request>>,
}

impl FakeGiCat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: &str, responses: Vec<HttpResponse>) -> &Self {
        self.add(method, path, None, responses)
    }

    pub fn on_query(
        &self,
        method: Method,
        path: &str,
        key: &str,
        value: &str,
        responses: Vec<HttpResponse>,
    ) -> &Self {
        self.add(
            method,
            path,
            Some((key.to_string(), value.to_string())),
            responses,
        )
    }

    fn add(
        &self,
        method: Method,
        path: &str,
        query: Option<(String, String)>,
        responses: Vec<HttpResponse>,
    ) -> &Self {
        self.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            query,
            responses: responses.into(),
        });
        self
    }

    /// Active profile "1" with the given distributor listing behind it.
    pub fn with_profile(&self, resources: &[(&str, &str)]) -> &Self {
        self.on(
            Method::Get,
            "/services/conf/giconf/configuration",
            vec![HttpResponse::ok("1")],
        )
        .on(
            Method::Get,
            "/services/conf/brokerConfigurations/1",
            vec![HttpResponse::ok(PROFILE_DOC)],
        )
        .on(
            Method::Get,
            "/services/conf/brokerConfigurations/1/distributors/D1",
            vec![HttpResponse::ok(distributor_doc(resources))],
        )
    }

    pub fn with_start(&self, id: &str, status: u16) -> &Self {
        self.on(
            Method::Get,
            &format!("/services/conf/brokerConfigurations/1/harvesters/{id}/start"),
            vec![HttpResponse::new(status, "")],
        )
    }

    pub fn with_statuses(&self, id: &str, statuses: &[&str]) -> &Self {
        self.on_query(
            Method::Get,
            "/services/conf/giconf/status",
            "id",
            id,
            statuses
                .iter()
                .map(|text| HttpResponse::ok(status_doc(text)))
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Request paths relative to the base URL, with `?id=` for status polls.
    pub fn calls(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| {
                let path = request.url.trim_start_matches(BASE_URL).to_string();
                match request.query.iter().find(|(key, _)| key == "id") {
                    Some((_, id)) => format!("{path}?id={id}"),
                    None => path,
                }
            })
            .collect()
    }

    /// Only the start and status calls, labelled `start R1` / `status R1`.
    pub fn harvest_calls(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| {
                if let Some(rest) = call.strip_suffix("/start") {
                    rest.rsplit('/').next().map(|id| format!("start {id}"))
                } else {
                    call.strip_prefix("/services/conf/giconf/status?id=")
                        .map(|id| format!("status {id}"))
                }
            })
            .collect()
    }
}

impl HttpTransport for FakeGiCat {
    fn send(&self, request: &Request) -> Result<HttpResponse, GiCatError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let route = routes.iter_mut().find(|route| {
            route.method == request.method
                && request.url == format!("{BASE_URL}{}", route.path)
                && route
                    .query
                    .as_ref()
                    .map(|pair| request.query.contains(pair))
                    .unwrap_or(true)
        });
        match route {
            Some(route) if route.responses.len() > 1 => Ok(route.responses.pop_front().unwrap()),
            Some(route) => route
                .responses
                .front()
                .cloned()
                .ok_or_else(|| GiCatError::Http("no canned response".to_string())),
            None => Err(GiCatError::Http(format!(
                "connection refused: {:?} {}",
                request.method, request.url
            ))),
        }
    }
}

pub fn client(fake: &FakeGiCat) -> GiCatClient<&FakeGiCat> {
    GiCatClient::new(ServiceEndpoint::new(BASE_URL, "admin", "abcd123$"), fake)
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HarvestEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<HarvestEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: HarvestEvent) {
        self.events.lock().unwrap().push(event);
    }
}
