use tracing::{debug, info};

use crate::config::{LUCENE_REQUEST_TIMEOUT_SECS, ServiceEndpoint};
use crate::domain::{Profile, ProfileId, Resource};
use crate::error::GiCatError;
use crate::http::{HttpResponse, HttpTransport, Request};
use crate::opensearch;
use crate::xml::XmlDocument;

const BROKER_CONFIGURATIONS: &str = "/services/conf/brokerConfigurations";
const ACTIVE_CONFIGURATION: &str = "/services/conf/giconf/configuration";
const OPENSEARCH_ESIP: &str = "/services/opensearchesip";
pub const HARVEST_STATUS: &str = "/services/conf/giconf/status";

/// Search term used to probe whether results carry relevance scores.
pub const LUCENE_PROBE_TERM: &str = "arctic%20alaskan%20shrubs";

/// Typed access to the GI-Cat administration API.
///
/// Every call re-reads server state; nothing about the active profile or its
/// components is cached between calls.
#[derive(Clone)]
pub struct GiCatClient<T: HttpTransport> {
    endpoint: ServiceEndpoint,
    transport: T,
}

impl<T: HttpTransport> GiCatClient<T> {
    pub fn new(endpoint: ServiceEndpoint, transport: T) -> Self {
        Self {
            endpoint,
            transport,
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub fn send(&self, request: &Request) -> Result<HttpResponse, GiCatError> {
        debug!(url = %request.url, method = ?request.method, "gicat.request");
        let response = self.transport.send(request)?;
        debug!(url = %request.url, status = response.status, "gicat.response");
        Ok(response)
    }

    fn configurations_url(&self, suffix: &str) -> String {
        self.endpoint.url(&format!("{BROKER_CONFIGURATIONS}{suffix}"))
    }

    fn fetch_xml(&self, url: String) -> Result<XmlDocument, GiCatError> {
        let request = Request::get(url).authorized(&self.endpoint);
        let body = self.send(&request)?.into_success()?;
        XmlDocument::parse(&body)
    }

    /// A transport failure means "not running" here rather than an error.
    pub fn is_running(&self) -> Result<bool, GiCatError> {
        let request = Request::get(self.endpoint.url("/"));
        match self.send(&request) {
            Ok(response) => Ok(response.status == 200),
            Err(GiCatError::Http(message)) => {
                debug!(%message, "GI-Cat is unreachable");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub fn create_profile(&self, name: &str) -> Result<String, GiCatError> {
        let body = format!(
            "inputNewName={}&nameBrokerCopy=%20",
            url::form_urlencoded::byte_serialize(name.as_bytes()).collect::<String>()
        );
        let request = Request::post(self.configurations_url("/newBroker"), body)
            .form(&self.endpoint);
        let profile_id = self.send(&request)?.into_success()?;
        info!(profile = name, id = profile_id.trim(), "created profile");
        Ok(profile_id.trim().to_string())
    }

    pub fn delete_profile(&self, name: &str) -> Result<String, GiCatError> {
        let profile_id = self.find_profile_id(name)?;
        let request = Request::get(self.configurations_url(&format!("/{profile_id}")))
            .query("opts", "delete")
            .query("random", cache_buster())
            .multipart(&self.endpoint);
        let body = self.send(&request)?.into_success()?;
        info!(profile = name, id = %profile_id, "deleted profile");
        Ok(body)
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>, GiCatError> {
        let request = Request::get(self.configurations_url(""))
            .query("nameRepository", "gicat")
            .authorized(&self.endpoint);
        let body = self.send(&request)?.into_success()?;
        let document = XmlDocument::parse(&body)?;
        document
            .descendants("brokerConfiguration")
            .iter()
            .filter_map(|element| {
                let id = element.attr("id")?;
                Some((id, element.attr("name").unwrap_or_default()))
            })
            .map(|(id, name)| {
                Ok(Profile {
                    id: id.parse()?,
                    name: name.to_string(),
                })
            })
            .collect()
    }

    pub fn find_profile_id(&self, name: &str) -> Result<ProfileId, GiCatError> {
        let request = Request::get(self.configurations_url(""))
            .query("nameRepository", "gicat")
            .authorized(&self.endpoint);
        let body = self.send(&request)?.into_success()?;
        parse_profile_id(&body, name)
    }

    pub fn active_profile_id(&self) -> Result<ProfileId, GiCatError> {
        let request = Request::get(self.endpoint.url(ACTIVE_CONFIGURATION)).standard_headers();
        let body = self.send(&request)?.into_success()?;
        body.parse()
            .map_err(|_| GiCatError::Discovery("service reported no active profile".to_string()))
    }

    pub fn enable_profile(&self, name: &str) -> Result<(), GiCatError> {
        let profile_id = self.find_profile_id(name)?;
        self.activate(&profile_id)?;
        info!(profile = name, id = %profile_id, "enabled profile");
        Ok(())
    }

    fn activate(&self, profile_id: &ProfileId) -> Result<(), GiCatError> {
        let request = Request::get(self.configurations_url(&format!("/{profile_id}")))
            .query("opts", "active")
            .authorized(&self.endpoint);
        self.send(&request)?.into_success()?;
        Ok(())
    }

    pub fn enable_lucene(&self) -> Result<(), GiCatError> {
        self.set_lucene_enabled(true)
    }

    pub fn disable_lucene(&self) -> Result<(), GiCatError> {
        self.set_lucene_enabled(false)
    }

    fn set_lucene_enabled(&self, enabled: bool) -> Result<(), GiCatError> {
        let profile_id = self.active_profile_id()?;
        let request = Request::put(
            self.configurations_url(&format!("/{profile_id}/luceneEnabled")),
            enabled.to_string(),
        )
        .authorized(&self.endpoint)
        .timeout(std::time::Duration::from_secs(LUCENE_REQUEST_TIMEOUT_SECS));
        self.send(&request)?.into_success()?;

        // the toggle only takes effect once the profile is activated again
        let profile_id = self.active_profile_id()?;
        self.activate(&profile_id)?;
        info!(id = %profile_id, enabled, "updated lucene indexing");
        Ok(())
    }

    pub fn query_esip_opensearch(&self, search_term: &str) -> Result<XmlDocument, GiCatError> {
        let query = opensearch::query_string(&[("st", search_term)]);
        let request = Request::get(self.endpoint.url(&format!("{OPENSEARCH_ESIP}{query}")));
        let body = self
            .send(&request)
            .and_then(HttpResponse::into_success)
            .map_err(|err| GiCatError::OpenSearch(err.to_string()))?;
        XmlDocument::parse(&body)
    }

    /// GI-Cat has no endpoint for this setting, so run a query and look for
    /// relevance scores in the results.
    pub fn is_lucene_enabled(&self) -> Result<bool, GiCatError> {
        let results = self.query_esip_opensearch(LUCENE_PROBE_TERM)?;
        Ok(!opensearch::relevance_scores(&results).is_empty())
    }

    pub fn distributor_id(&self, profile_id: &ProfileId) -> Result<String, GiCatError> {
        let document = self.fetch_xml(self.configurations_url(&format!("/{profile_id}")))?;
        document
            .descendants("component")
            .iter()
            .find_map(|component| component.first_text("id"))
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GiCatError::Discovery(format!(
                    "profile {profile_id} has no distributor component"
                ))
            })
    }

    /// Harvestable components under the profile's distributor, in document order.
    pub fn list_resources(&self, profile_id: &ProfileId) -> Result<Vec<Resource>, GiCatError> {
        let distributor_id = self.distributor_id(profile_id)?;
        let body = self.fetch_xml(
            self.configurations_url(&format!("/{profile_id}/distributors/{distributor_id}")),
        )?;
        parse_resources(&body, &distributor_id)
    }

    pub fn create_accessor(
        &self,
        profile_name: &str,
        params: &[(String, String)],
    ) -> Result<String, GiCatError> {
        let profile_id = self.find_profile_id(profile_name)?;
        let distributor_id = self.distributor_id(&profile_id)?;
        let body = form_body(params);

        let request = Request::post(
            self.configurations_url(&format!("/{profile_id}/distributors/{distributor_id}")),
            body.clone(),
        )
        .form(&self.endpoint);
        let response = self.send(&request)?.into_success()?;

        // "<accessor id>,<harvester id>"
        let accessor_id = response
            .split(',')
            .next()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                GiCatError::Discovery("service returned no accessor id".to_string())
            })?;

        let request = Request::post(
            self.configurations_url(&format!("/{profile_id}/accessors/{accessor_id}/update")),
            body,
        )
        .form(&self.endpoint);
        self.send(&request)?.into_success()?;

        self.enable_profile(profile_name)?;
        info!(profile = profile_name, accessor = %accessor_id, "created accessor");
        Ok(accessor_id)
    }

    pub fn delete_accessor(&self, profile_name: &str, accessor_name: &str) -> Result<(), GiCatError> {
        let profile_id = self.find_profile_id(profile_name)?;
        let harvester = self
            .list_resources(&profile_id)?
            .into_iter()
            .find(|resource| resource.title == accessor_name)
            .ok_or_else(|| {
                GiCatError::Discovery(format!(
                    "no accessor named '{accessor_name}' in profile '{profile_name}'"
                ))
            })?;

        let request = Request::get(
            self.configurations_url(&format!("/{profile_id}/harvesters/{}", harvester.id)),
        )
        .query("delete", "true")
        .query("random", cache_buster())
        .multipart(&self.endpoint);
        self.send(&request)?.into_success()?;
        info!(profile = profile_name, accessor = accessor_name, "deleted accessor");
        Ok(())
    }

    pub fn publish_interface(
        &self,
        profile_name: &str,
        params: &[(String, String)],
    ) -> Result<String, GiCatError> {
        let profile_id = self.find_profile_id(profile_name)?;
        let request = Request::post(
            self.configurations_url(&format!("/{profile_id}/profilers/")),
            form_body(params),
        )
        .form(&self.endpoint);
        let body = self.send(&request)?.into_success()?;
        info!(profile = profile_name, "published interface");
        Ok(body)
    }

    pub fn unpublish_interface(
        &self,
        profile_name: &str,
        interface_name: &str,
    ) -> Result<(), GiCatError> {
        let profile_id = self.find_profile_id(profile_name)?;
        let request = Request::get(
            self.configurations_url(&format!("/{profile_id}/profilers/{interface_name}")),
        )
        .query("delete", "true")
        .query("random", cache_buster())
        .form(&self.endpoint);
        self.send(&request)?.into_success()?;
        info!(profile = profile_name, interface = interface_name, "unpublished interface");
        Ok(())
    }
}

pub fn parse_profile_id(body: &str, name: &str) -> Result<ProfileId, GiCatError> {
    let document = XmlDocument::parse(body)?;
    let id = document
        .find_by_attr("brokerConfiguration", "name", name)
        .and_then(|element| element.attr("id"))
        .ok_or_else(|| GiCatError::ProfileNotFound(name.to_string()))?;
    id.parse()
}

pub fn parse_resources(
    document: &XmlDocument,
    distributor_id: &str,
) -> Result<Vec<Resource>, GiCatError> {
    document
        .descendants("component")
        .iter()
        .map(|component| {
            let id = component
                .first_text("id")
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    GiCatError::Discovery(format!(
                        "distributor {distributor_id} lists a component without an id"
                    ))
                })?;
            Ok(Resource::new(id, component.first_text("title")))
        })
        .collect()
}

/// Random query value that defeats the service's GET response cache.
pub fn cache_buster() -> String {
    rand::random::<f64>().to_string()
}

pub fn form_body(params: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}
