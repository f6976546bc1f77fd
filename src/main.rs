use card_delivery::{
    card::{CardChannel, PcscChannel, TracedChannel},
    config::Config,
    connector::{
        CLIENT_SERVICE_PROVIDER, ConnectorTransport, Credentials, PollConfig, PollingTransport,
        StreamingTransport, Target,
    },
    delivery::{DeliverySession, interrupt::deliver_until_interrupted},
    form::{ConsoleForm, ScriptedForm},
    telemetry,
};
use color_eyre::eyre::{OptionExt as _, WrapErr as _};
use url::Url;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::load()?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let service = config
        .delivery
        .service
        .as_deref()
        .ok_or_eyre("No service configured, set APP_DELIVERY__SERVICE to <appId>/<serviceId>")?;

    let reader = PcscChannel::connect(config.card.reader.as_deref())?;
    let card: Box<dyn CardChannel> = if config.card.apdu_trace {
        Box::new(TracedChannel::new(reader))
    } else {
        Box::new(reader)
    };

    let credentials = config.api.auth.as_ref().map(Credentials::parse);
    let (transport, target): (Box<dyn ConnectorTransport>, Target) =
        if service.starts_with("ws://") || service.starts_with("wss://") {
            let url = Url::parse(service).wrap_err("Invalid streaming service URL")?;
            let mut transport = StreamingTransport::new(url);
            if let Some(credentials) = credentials {
                transport = transport.with_credentials(credentials);
            }
            // The script lives behind the URL, the handshake only names the requester
            let target = Target::recipe(CLIENT_SERVICE_PROVIDER, serde_json::Value::Null);
            (Box::new(transport), target)
        } else {
            let target = Target::parse_service(service)?;
            let poll = PollConfig::from(&config.delivery);
            (Box::new(PollingTransport::from_config(&config.api, poll)?), target)
        };

    let fields = config.delivery.fields.as_deref().unwrap_or_default();
    let form = ScriptedForm::parse(fields)?.with_fallback(ConsoleForm::stdin());

    let mut session = DeliverySession::new(card, transport, target, form);
    session.set_timeout(config.delivery.timeout());
    let handle = session.start();

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    let result = deliver_until_interrupted(&handle, interrupt, config.delivery.cancel_grace()).await;

    println!("{result}");
    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
