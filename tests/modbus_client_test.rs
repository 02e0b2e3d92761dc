//! Modbus TCP客户端集成测试
//!
//! 在本机启动一个进程内Modbus服务端，验证符号映射、字节序、原始区域与链路断开处理

use std::collections::HashMap;
use std::future::{self, Future};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_modbus::prelude::*;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use hmi_lib::domain::{CommunicationManager, IPlcClient, PlcEndpoint};
use hmi_lib::infrastructure::ModbusTcpPlcClient;
use hmi_lib::models::{ByteOrder, Indicator, IndicatorState, PlcDataType, PlcValue};
use hmi_lib::utils::config::{AppConfig, PlcConfig, SymbolConfig};

#[derive(Default)]
struct Registers {
    coils: HashMap<u16, bool>,
    holding: HashMap<u16, u16>,
    /// 下一次读线圈的应答延迟，只生效一次
    delay_next_coil_read: Option<Duration>,
}

/// 进程内模拟的Modbus从站
#[derive(Clone, Default)]
struct TestDevice {
    registers: Arc<Mutex<Registers>>,
}

impl tokio_modbus::server::Service for TestDevice {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Exception>> + Send>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let mut regs = self.registers.lock().unwrap();
        let delay = match req {
            Request::ReadCoils(..) => regs.delay_next_coil_read.take(),
            _ => None,
        };
        let res = match req {
            Request::ReadCoils(addr, cnt) => (0..cnt)
                .map(|i| regs.coils.get(&(addr + i)).copied().ok_or(ExceptionCode::IllegalDataAddress))
                .collect::<Result<Vec<bool>, _>>()
                .map(Response::ReadCoils),
            Request::WriteSingleCoil(addr, value) => {
                if regs.coils.contains_key(&addr) {
                    regs.coils.insert(addr, value);
                    Ok(Response::WriteSingleCoil(addr, value))
                } else {
                    Err(ExceptionCode::IllegalDataAddress)
                }
            }
            Request::ReadHoldingRegisters(addr, cnt) => (0..cnt)
                .map(|i| regs.holding.get(&(addr + i)).copied().ok_or(ExceptionCode::IllegalDataAddress))
                .collect::<Result<Vec<u16>, _>>()
                .map(Response::ReadHoldingRegisters),
            Request::WriteSingleRegister(addr, value) => {
                if regs.holding.contains_key(&addr) {
                    regs.holding.insert(addr, value);
                    Ok(Response::WriteSingleRegister(addr, value))
                } else {
                    Err(ExceptionCode::IllegalDataAddress)
                }
            }
            Request::WriteMultipleRegisters(addr, values) => {
                let in_range = (0..values.len() as u16).all(|i| regs.holding.contains_key(&(addr + i)));
                if in_range {
                    for (i, value) in values.iter().enumerate() {
                        regs.holding.insert(addr + i as u16, *value);
                    }
                    Ok(Response::WriteMultipleRegisters(addr, values.len() as u16))
                } else {
                    Err(ExceptionCode::IllegalDataAddress)
                }
            }
            _ => Err(ExceptionCode::IllegalFunction),
        };
        match delay {
            Some(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                res
            }),
            None => Box::pin(future::ready(res)),
        }
    }
}

async fn start_device(device: TestDevice) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = listener.local_addr().unwrap();
    let server = Server::new(listener);

    let handle = tokio::spawn(async move {
        let new_service = move |_socket_addr| Ok(Some(device.clone()));
        let on_connected = move |stream, socket_addr| {
            let new_service = new_service.clone();
            async move { accept_tcp_connection(stream, socket_addr, new_service) }
        };
        let on_process_error = |err| eprintln!("服务端错误: {}", err);
        let _ = server.serve(&on_connected, on_process_error).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (socket_addr, handle)
}

fn symbol(address: &str, data_type: PlcDataType) -> SymbolConfig {
    SymbolConfig {
        address: address.to_string(),
        data_type,
        string_length: 8,
    }
}

fn plc_config(addr: SocketAddr) -> PlcConfig {
    let mut config = PlcConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        byte_order: ByteOrder::CDAB,
        ..PlcConfig::default()
    };
    config.symbols.insert("MAIN.bLamp".to_string(), symbol("00001", PlcDataType::Bool));
    config.symbols.insert("MAIN.bStart".to_string(), symbol("00002", PlcDataType::Bool));
    config.symbols.insert("MAIN.bMissing".to_string(), symbol("00050", PlcDataType::Bool));
    config.symbols.insert("MAIN.fSetPos".to_string(), symbol("40001", PlcDataType::Float64));
    config.symbols.insert("MAIN.nErrorCode".to_string(), symbol("40005", PlcDataType::UInt16));
    config.symbols.insert("MAIN.sResult".to_string(), symbol("40006", PlcDataType::String));
    config.raw_areas.insert(0x4020, "40011".to_string());
    config
}

fn seeded_device() -> TestDevice {
    let device = TestDevice::default();
    {
        let mut regs = device.registers.lock().unwrap();
        regs.coils.insert(0, true);
        regs.coils.insert(1, false);
        for addr in 0..20 {
            regs.holding.insert(addr, 0);
        }
        regs.holding.insert(4, 7);
    }
    device
}

#[tokio::test]
async fn test_symbol_read_write_over_modbus() {
    let device = seeded_device();
    let (addr, _server) = start_device(device.clone()).await;
    let config = plc_config(addr);
    let client = ModbusTcpPlcClient::new(&config);

    client.connect(&PlcEndpoint::from(&config)).await.unwrap();
    assert!(client.is_connected().await);

    assert_eq!(client.read_symbol("MAIN.bLamp", PlcDataType::Bool).await.unwrap(), PlcValue::Bool(true));
    client.write_symbol("MAIN.bStart", &PlcValue::Bool(true)).await.unwrap();
    assert_eq!(device.registers.lock().unwrap().coils.get(&1), Some(&true));

    client.write_symbol("MAIN.fSetPos", &PlcValue::Float64(-42.75)).await.unwrap();
    assert_eq!(
        client.read_symbol("MAIN.fSetPos", PlcDataType::Float64).await.unwrap(),
        PlcValue::Float64(-42.75)
    );
    assert_eq!(
        client.read_symbol("MAIN.nErrorCode", PlcDataType::UInt16).await.unwrap(),
        PlcValue::UInt16(7)
    );

    client.write_symbol("MAIN.sResult", &PlcValue::String("PASS".to_string())).await.unwrap();
    assert_eq!(
        client.read_symbol("MAIN.sResult", PlcDataType::String).await.unwrap(),
        PlcValue::String("PASS".to_string())
    );

    client.dispose().await;
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_exception_keeps_link_alive() {
    let (addr, _server) = start_device(seeded_device()).await;
    let config = plc_config(addr);
    let client = ModbusTcpPlcClient::new(&config);
    client.connect(&PlcEndpoint::from(&config)).await.unwrap();

    let err = client.read_symbol("MAIN.bMissing", PlcDataType::Bool).await.unwrap_err();
    assert_eq!(err.error_code(), "PLC_COMMUNICATION_ERROR");
    assert!(client.is_connected().await);
    assert!(client.read_symbol("MAIN.bLamp", PlcDataType::Bool).await.is_ok());
}

#[tokio::test]
async fn test_raw_area_through_manager() {
    let device = seeded_device();
    let (addr, _server) = start_device(device.clone()).await;
    let mut app_config = AppConfig::default();
    app_config.plc_config = plc_config(addr);
    let client = ModbusTcpPlcClient::new(&app_config.plc_config);
    let manager = CommunicationManager::from_config(Box::new(client), &app_config);

    manager.write_dint(0x4020, 1, 0x0102_0304).await.unwrap();
    {
        let regs = device.registers.lock().unwrap();
        // 区域起始 40011 → 协议偏移10，再加偏移1
        assert_eq!(regs.holding.get(&11), Some(&0x0403));
        assert_eq!(regs.holding.get(&12), Some(&0x0201));
    }
    assert_eq!(manager.read_dint(0x4020, 1).await.unwrap(), 0x0102_0304);
    assert!(manager.read_write_errors().await.is_empty());
    manager.dispose().await;
}

#[tokio::test]
async fn test_manager_polls_indicator_over_modbus() {
    let device = seeded_device();
    let (addr, _server) = start_device(device.clone()).await;
    let mut app_config = AppConfig::default();
    app_config.plc_config = plc_config(addr);
    let manager = CommunicationManager::from_config(
        Box::new(ModbusTcpPlcClient::new(&app_config.plc_config)),
        &app_config,
    );

    let lamp = Arc::new(Indicator::new("MAIN.bLamp"));
    let missing = Arc::new(Indicator::new("MAIN.bMissing"));
    manager.register(lamp.clone().into()).await;
    manager.register(missing.clone().into()).await;

    manager.poll().await;
    assert_eq!(lamp.state(), IndicatorState::On);
    assert_eq!(missing.state(), IndicatorState::Unknown);
    assert_eq!(manager.read_write_errors().await, vec!["MAIN.bMissing".to_string()]);
    assert!(manager.is_connected().await);

    device.registers.lock().unwrap().coils.insert(0, false);
    manager.poll().await;
    assert_eq!(lamp.state(), IndicatorState::Off);
    manager.dispose().await;
}

#[tokio::test]
async fn test_connect_to_closed_port_fails() {
    // 绑定后立即释放，得到一个大概率无人监听的端口
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = plc_config(addr);
    let client = ModbusTcpPlcClient::new(&config);
    let err = client.connect(&PlcEndpoint::from(&config)).await.unwrap_err();
    assert_eq!(err.error_code(), "CONNECTION_ERROR");
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_timed_out_reply_does_not_leak_into_next_request() {
    let device = seeded_device();
    device.registers.lock().unwrap().delay_next_coil_read = Some(Duration::from_millis(300));
    let (addr, _server) = start_device(device.clone()).await;
    let mut app_config = AppConfig::default();
    app_config.plc_config = plc_config(addr);
    app_config.plc_config.io_timeout_ms = 100;
    let manager = CommunicationManager::from_config(
        Box::new(ModbusTcpPlcClient::new(&app_config.plc_config)),
        &app_config,
    );

    let err = manager.read_bool("MAIN.bLamp").await.unwrap_err();
    assert_eq!(err.error_code(), "TIMEOUT_ERROR");
    assert!(!manager.is_connected().await);

    // 让迟到的应答先到达旧链路
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(!manager.read_bool("MAIN.bStart").await.unwrap());
    assert_eq!(manager.read_write_errors().await, vec!["MAIN.bLamp".to_string()]);
    assert!(manager.read_bool("MAIN.bLamp").await.unwrap());
    assert!(manager.read_write_errors().await.is_empty());
    assert!(manager.is_connected().await);
    manager.dispose().await;
}
