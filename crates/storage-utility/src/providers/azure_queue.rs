//! Azure Queue Storage provider using the queue service REST API.
//!
//! The queue service speaks XML. Message text is XML-escaped on the way in
//! and unescaped on the way out; no base64 encoding is applied, so messages
//! written by other clients with base64 encoding come back as-is.
//!
//! ## Operations
//!
//! | Operation        | Request                                         |
//! |------------------|-------------------------------------------------|
//! | queue exists     | `GET /{queue}?comp=metadata`                    |
//! | create queue     | `PUT /{queue}`                                  |
//! | delete queue     | `DELETE /{queue}`                               |
//! | put message      | `POST /{queue}/messages`                        |
//! | get messages     | `GET /{queue}/messages?numofmessages=N`         |
//! | delete message   | `DELETE /{queue}/messages/{id}?popreceipt=R`    |

use super::azure::{
    build_http_client, query_string, read_response, AzureStorageError, ServiceEndpoint,
    ServiceResponse,
};
use super::shared_key::{format_storage_date, SharedKeySigner, STORAGE_API_VERSION};
use crate::client::QueueProvider;
use crate::config::StorageConfig;
use crate::error::{SerializationError, StorageError};
use crate::message::{MessageId, PopReceipt, QueueMessage, QueueName};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client as HttpClient, Method, StatusCode};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
#[path = "azure_queue_tests.rs"]
mod tests;

const PROVIDER_NAME: &str = "AzureQueue";

const XML_CONTENT_TYPE: &str = "application/xml";

/// Azure Queue Storage provider implementation
pub struct AzureQueueProvider {
    http_client: HttpClient,
    signer: SharedKeySigner,
    endpoint: ServiceEndpoint,
    timeout: Duration,
}

impl AzureQueueProvider {
    /// Create new Azure queue provider
    ///
    /// # Errors
    ///
    /// Returns error if the account key is not base64, the endpoint is not
    /// a valid URL, or the HTTP client cannot be built.
    pub fn new(config: &StorageConfig) -> Result<Self, AzureStorageError> {
        let signer = SharedKeySigner::new(&config.account)?;
        let endpoint = ServiceEndpoint::parse(&config.queue_endpoint())?;
        let timeout = config.request_timeout();
        let http_client = build_http_client(timeout)?;

        Ok(Self {
            http_client,
            signer,
            endpoint,
            timeout,
        })
    }

    /// Send a signed request to the queue service
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<ServiceResponse, AzureStorageError> {
        let date = format_storage_date(&Utc::now());
        let comp = query
            .iter()
            .find(|(name, _)| *name == "comp")
            .map(|(_, value)| value.as_str());
        let content_type = if body.is_some() { XML_CONTENT_TYPE } else { "" };

        let resource = self
            .signer
            .canonicalized_resource(&self.endpoint.resource_path(path), comp);
        let string_to_sign = SharedKeySigner::queue_string_to_sign(
            method.as_str(),
            content_type,
            &[("x-ms-date", date.as_str()), ("x-ms-version", STORAGE_API_VERSION)],
            &resource,
        );
        let authorization = self.signer.authorization(&string_to_sign);

        let mut url = self.endpoint.url(path);
        if !query.is_empty() {
            url = format!("{}?{}", url, query_string(query));
        }

        debug!(method = %method, path = %path, "Sending queue request");

        let mut request = self
            .http_client
            .request(method, &url)
            .header("x-ms-date", date.as_str())
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("Authorization", authorization);

        if let Some(body) = body {
            request = request.header("Content-Type", content_type).body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AzureStorageError::from_send_error(e, self.timeout))?;

        read_response(response, parse_error_message).await
    }

    fn queue_error(queue: &QueueName, error: AzureStorageError) -> StorageError {
        match error.status() {
            Some(404) => StorageError::QueueNotFound {
                queue_name: queue.to_string(),
            },
            _ => error.into_storage_error(),
        }
    }

    fn message_error(
        queue: &QueueName,
        message_id: &MessageId,
        error: AzureStorageError,
    ) -> StorageError {
        match (error.status(), error.code()) {
            (Some(404), Some("QueueNotFound")) => StorageError::QueueNotFound {
                queue_name: queue.to_string(),
            },
            (Some(404), _) => StorageError::MessageNotFound {
                message_id: message_id.to_string(),
            },
            (Some(400), Some("PopReceiptMismatch")) => StorageError::InvalidReceipt {
                message_id: message_id.to_string(),
            },
            _ => error.into_storage_error(),
        }
    }
}

#[async_trait]
impl QueueProvider for AzureQueueProvider {
    async fn queue_exists(&self, queue: &QueueName) -> Result<bool, StorageError> {
        let query = [("comp", "metadata".to_string())];
        match self
            .send(Method::GET, &format!("/{}", queue), &query, None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e.into_storage_error()),
        }
    }

    async fn create_queue(&self, queue: &QueueName) -> Result<bool, StorageError> {
        match self
            .send(Method::PUT, &format!("/{}", queue), &[], None)
            .await
        {
            // 204 means the queue already existed with the same metadata
            Ok(response) => Ok(response.status == StatusCode::CREATED),
            Err(e) if e.code() == Some("QueueAlreadyExists") => Ok(false),
            Err(e) => Err(e.into_storage_error()),
        }
    }

    async fn delete_queue(&self, queue: &QueueName) -> Result<bool, StorageError> {
        match self
            .send(Method::DELETE, &format!("/{}", queue), &[], None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(false),
            Err(e) => Err(e.into_storage_error()),
        }
    }

    async fn put_message(
        &self,
        queue: &QueueName,
        content: &str,
    ) -> Result<QueueMessage, StorageError> {
        let body = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            quick_xml::escape::escape(content)
        );

        let response = self
            .send(
                Method::POST,
                &format!("/{}/messages", queue),
                &[],
                Some(body),
            )
            .await
            .map_err(|e| Self::queue_error(queue, e))?;

        let mut message = parse_messages(&response.body)?
            .into_iter()
            .next()
            .ok_or_else(|| SerializationError::MissingElement {
                element: "QueueMessage".to_string(),
            })?;
        message.content = content.to_string();
        Ok(message)
    }

    async fn get_messages(
        &self,
        queue: &QueueName,
        num_messages: u32,
    ) -> Result<Vec<QueueMessage>, StorageError> {
        let query = [("numofmessages", num_messages.to_string())];

        let response = self
            .send(
                Method::GET,
                &format!("/{}/messages", queue),
                &query,
                None,
            )
            .await
            .map_err(|e| Self::queue_error(queue, e))?;

        Ok(parse_messages(&response.body)?)
    }

    async fn delete_message(
        &self,
        queue: &QueueName,
        message_id: &MessageId,
        pop_receipt: &PopReceipt,
    ) -> Result<(), StorageError> {
        let query = [("popreceipt", pop_receipt.as_str().to_string())];
        let path = format!(
            "/{}/messages/{}",
            queue,
            urlencoding::encode(message_id.as_str())
        );

        self.send(Method::DELETE, &path, &query, None)
            .await
            .map_err(|e| Self::message_error(queue, message_id, e))?;

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

impl std::fmt::Debug for AzureQueueProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureQueueProvider")
            .field("signer", &self.signer)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// XML Parsing
// ============================================================================

/// Fields of one `<QueueMessage>` element as they are read
#[derive(Default)]
struct MessageFields {
    id: Option<String>,
    pop_receipt: Option<String>,
    content: String,
    insertion_time: Option<DateTime<Utc>>,
    expiration_time: Option<DateTime<Utc>>,
    time_next_visible: Option<DateTime<Utc>>,
    dequeue_count: u32,
}

impl MessageFields {
    /// Record the text of a child element
    ///
    /// Message text is kept verbatim and may arrive in several chunks; every
    /// other field is trimmed.
    fn set(&mut self, element: &[u8], text: &str) -> Result<(), SerializationError> {
        match element {
            b"MessageText" => self.content.push_str(text),
            b"MessageId" => self.id = Some(text.trim().to_string()),
            b"PopReceipt" => self.pop_receipt = Some(text.trim().to_string()),
            b"InsertionTime" => self.insertion_time = parse_service_date(text),
            b"ExpirationTime" => self.expiration_time = parse_service_date(text),
            b"TimeNextVisible" => self.time_next_visible = parse_service_date(text),
            b"DequeueCount" => {
                self.dequeue_count = text.trim().parse().map_err(|e| SerializationError::Xml {
                    message: format!("Invalid DequeueCount '{}': {}", text, e),
                })?;
            }
            _ => {}
        }
        Ok(())
    }

    fn build(self) -> Result<QueueMessage, SerializationError> {
        let id = self.id.ok_or_else(|| SerializationError::MissingElement {
            element: "MessageId".to_string(),
        })?;
        let pop_receipt = self
            .pop_receipt
            .ok_or_else(|| SerializationError::MissingElement {
                element: "PopReceipt".to_string(),
            })?;

        Ok(QueueMessage {
            id: MessageId(id),
            content: self.content,
            pop_receipt: PopReceipt(pop_receipt),
            insertion_time: self.insertion_time,
            expiration_time: self.expiration_time,
            time_next_visible: self.time_next_visible,
            dequeue_count: self.dequeue_count,
        })
    }
}

fn parse_service_date(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Parse a `QueueMessagesList` response
fn parse_messages(xml: &str) -> Result<Vec<QueueMessage>, SerializationError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);

    let mut messages = Vec::new();
    let mut current: Option<MessageFields> = None;
    let mut element: Vec<u8> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"QueueMessage" => {
                current = Some(MessageFields::default());
            }
            Ok(Event::Start(ref e)) => {
                element = e.name().as_ref().to_vec();
            }
            Ok(Event::Text(e)) => {
                if let Some(fields) = current.as_mut() {
                    let text = e.unescape().map_err(|e| SerializationError::Xml {
                        message: format!("Failed to parse XML: {}", e),
                    })?;
                    fields.set(&element, &text)?;
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(fields) = current.as_mut() {
                    let text =
                        std::str::from_utf8(&e).map_err(|e| SerializationError::Xml {
                            message: format!("Invalid CDATA: {}", e),
                        })?;
                    fields.set(&element, text)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"QueueMessage" => {
                if let Some(fields) = current.take() {
                    messages.push(fields.build()?);
                }
            }
            Ok(Event::End(_)) => element.clear(),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SerializationError::Xml {
                    message: format!("XML parsing error: {}", e),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(messages)
}

/// Extract code and message from an XML error body
fn parse_error_message(xml: &str) -> Option<(Option<String>, String)> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut code = None;
    let mut message = None;
    let mut element: Vec<u8> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => element = e.name().as_ref().to_vec(),
            Ok(Event::Text(e)) => {
                let text = e.unescape().ok().map(|s| s.into_owned());
                match element.as_slice() {
                    b"Code" => code = text,
                    b"Message" => message = text,
                    _ => {}
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    message.map(|message| (code, message))
}
