use crate::prelude::*;
use crate::service::var_service::{Secrets, Settings};
use anyhow::anyhow;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{parse_service_account_key, ServiceAccountAuthenticator};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DRIVE_FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

/// Cell-addressed access to one worksheet. Ranges are A1 notation without a
/// sheet prefix.
pub trait SheetStore {
    /// Display text of a single cell, `None` when blank.
    async fn read_cell(&self, cell: &str) -> Result<Option<String>>;
    /// Writes `grid` row by row with its top-left corner at `anchor`.
    async fn write_range(&self, anchor: &str, grid: &[Vec<Value>]) -> Result<()>;
    async fn clear_range(&self, range: &str) -> Result<()>;
    async fn clear_all(&self) -> Result<()>;
}

/// First worksheet of a Google spreadsheet, authenticated as a service account.
pub struct GoogleSheet {
    client: Client,
    auth: DefaultAuthenticator,
    spreadsheet_id: String,
    sheet_title: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: u32,
}

#[derive(Deserialize)]
struct ValueRangeResponse {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange<'a> {
    major_dimension: &'a str,
    values: &'a [Vec<Value>],
}

impl GoogleSheet {
    pub async fn open(secrets: &Secrets, settings: &Settings) -> Result<Self> {
        let key = parse_service_account_key(&secrets.service_account_json)
            .context("GOOGLE_JSON_DATA is not a service-account key")?;
        let auth = ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .context("Failed to build service-account authenticator")?;
        let client = Client::builder().timeout(settings.api_timeout).build()?;

        let spreadsheet_id = match &settings.spreadsheet_id {
            Some(id) => id.clone(),
            None => find_spreadsheet_id(&client, &auth, &settings.spreadsheet_title).await?,
        };
        let sheet_title = first_sheet_title(&client, &auth, &spreadsheet_id).await?;
        tracing::info!(
            "Opened spreadsheet {:?} ({}), worksheet {:?}",
            settings.spreadsheet_title,
            spreadsheet_id,
            sheet_title
        );

        Ok(GoogleSheet {
            client,
            auth,
            spreadsheet_id,
            sheet_title,
        })
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API URL cannot be a base"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}{}", qualified_range(&self.sheet_title, range), suffix));
        Ok(url)
    }
}

impl SheetStore for GoogleSheet {
    async fn read_cell(&self, cell: &str) -> Result<Option<String>> {
        let url = self.values_url(cell, "")?;
        let response = self
            .client
            .get(url)
            .bearer_auth(bearer(&self.auth).await?)
            .send()
            .await?;
        let body: ValueRangeResponse = check(response, "values.get").await?.json().await?;

        Ok(body
            .values
            .first()
            .and_then(|row| row.first())
            .and_then(cell_text))
    }

    async fn write_range(&self, anchor: &str, grid: &[Vec<Value>]) -> Result<()> {
        let mut url = self.values_url(anchor, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let response = self
            .client
            .put(url)
            .bearer_auth(bearer(&self.auth).await?)
            .json(&ValueRange {
                major_dimension: "ROWS",
                values: grid,
            })
            .send()
            .await?;
        check(response, "values.update").await?;

        Ok(())
    }

    async fn clear_range(&self, range: &str) -> Result<()> {
        let url = self.values_url(range, ":clear")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer(&self.auth).await?)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        check(response, "values.clear").await?;

        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        let mut url = Url::parse(SHEETS_API)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Sheets API URL cannot be a base"))?
            .push(&self.spreadsheet_id)
            .push("values")
            .push(&format!("{}:clear", quoted_title(&self.sheet_title)));
        let response = self
            .client
            .post(url)
            .bearer_auth(bearer(&self.auth).await?)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        check(response, "values.clear").await?;

        Ok(())
    }
}

async fn bearer(auth: &DefaultAuthenticator) -> Result<String> {
    let token = auth.token(&SCOPES).await.context("Failed to get access token")?;
    token
        .token()
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow!("Access token response had no token"))
}

async fn check(response: Response, call: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!("Non-success response from Sheets {}: {}", call, status);
    Err(anyhow!("{} returned {}: {}", call, status, body))
}

async fn find_spreadsheet_id(
    client: &Client,
    auth: &DefaultAuthenticator,
    title: &str,
) -> Result<String> {
    let mut url = Url::parse(DRIVE_FILES_API)?;
    url.query_pairs_mut()
        .append_pair("q", &drive_query(title))
        .append_pair("fields", "files(id,name)")
        .append_pair("pageSize", "10");
    let response = client
        .get(url)
        .bearer_auth(bearer(auth).await?)
        .send()
        .await?;
    let files: FileList = check(response, "files.list").await?.json().await?;

    match files.files.as_slice() {
        [] => Err(anyhow!(
            "No spreadsheet titled {:?} is shared with the service account",
            title
        )),
        [file, rest @ ..] => {
            if !rest.is_empty() {
                tracing::warn!(
                    "{} spreadsheets are titled {:?}, using {}",
                    rest.len() + 1,
                    file.name,
                    file.id
                );
            }
            Ok(file.id.clone())
        }
    }
}

async fn first_sheet_title(
    client: &Client,
    auth: &DefaultAuthenticator,
    spreadsheet_id: &str,
) -> Result<String> {
    let mut url = Url::parse(SHEETS_API)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Sheets API URL cannot be a base"))?
        .push(spreadsheet_id);
    url.query_pairs_mut()
        .append_pair("fields", "sheets.properties(title,index)");
    let response = client
        .get(url)
        .bearer_auth(bearer(auth).await?)
        .send()
        .await?;
    let spreadsheet: Spreadsheet = check(response, "spreadsheets.get").await?.json().await?;

    spreadsheet
        .sheets
        .into_iter()
        .min_by_key(|sheet| sheet.properties.index)
        .map(|sheet| sheet.properties.title)
        .ok_or_else(|| anyhow!("Spreadsheet {} has no worksheets", spreadsheet_id))
}

fn drive_query(title: &str) -> String {
    let escaped = title.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, SPREADSHEET_MIME
    )
}

fn quoted_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn qualified_range(title: &str, range: &str) -> String {
    format!("{}!{}", quoted_title(title), range)
}

fn cell_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };

    match text.is_empty() {
        true => None,
        false => Some(text),
    }
}
